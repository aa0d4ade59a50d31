//! Core engine for the procyon supervisor
//!
//! This crate contains the service dependency graph and state-transition
//! engine: service records, the reactor that drives them to fixed point,
//! the console arbiter, and the hook surfaces through which the rest of
//! the system (process supervision, control sockets, logging output)
//! collaborates with the engine.

pub mod config;
pub mod error;
pub mod supervisor;

// Re-export schema types for convenience
pub use schema::*;

pub use config::DirLoader;
pub use error::{CoreError, LoadError, Result};
pub use supervisor::{ServiceId, ServiceSet};

/// Core utilities and helper functions
pub mod utils {
    use tracing::info;

    /// Initialize tracing for the application
    pub fn init_tracing(level: &str) -> crate::Result<()> {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        fmt()
            .with_env_filter(filter)
            .try_init()
            .map_err(|e| crate::CoreError::Initialization(e.to_string()))?;

        info!("Tracing initialized with level: {}", level);
        Ok(())
    }
}
