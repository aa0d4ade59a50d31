//! Core error types and utilities

use thiserror::Error;

/// Errors produced by the service set and its public operations
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    #[error("Service already exists: {0}")]
    ServiceExists(String),

    #[error("Service '{0}' is still active or referenced by other services")]
    ServiceInUse(String),

    #[error("Service '{service}' depends on unknown service '{dependency}'")]
    DependencyNotFound { service: String, dependency: String },

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Initialization error: {0}")]
    Initialization(String),
}

impl CoreError {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::ServiceNotFound(_) => "PROC001",
            CoreError::ServiceExists(_) => "PROC002",
            CoreError::ServiceInUse(_) => "PROC003",
            CoreError::DependencyNotFound { .. } => "PROC004",
            CoreError::Load(_) => "PROC005",
            CoreError::Io(_) => "PROC006",
            CoreError::Initialization(_) => "PROC007",
        }
    }
}

/// Errors produced while loading a service description
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("No service description for '{0}'")]
    NotFound(String),

    #[error("Service '{service}': {detail}")]
    Parse { service: String, detail: String },

    #[error("Service '{service}': {detail}")]
    Validation { service: String, detail: String },

    #[error("Circular dependency involving service '{0}'")]
    DependencyCycle(String),

    #[error("I/O error reading service description: {0}")]
    Io(#[from] std::io::Error),
}

/// Core-specific result type
pub type Result<T> = std::result::Result<T, CoreError>;
