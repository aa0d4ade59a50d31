//! Schema definitions for the procyon supervisor
//!
//! This crate contains the shared vocabulary used across the procyon
//! ecosystem: service lifecycle states, dependency types, stop reasons,
//! lifecycle events and the declarative service description consumed by
//! service loaders. All types implement JSON Schema generation for
//! external consumption.

pub mod events;
pub mod service;

// Re-export for convenience
pub use events::*;
pub use service::*;
