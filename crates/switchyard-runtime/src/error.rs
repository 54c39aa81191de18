//! Runtime error types.

use switchyard_core::AliasConflict;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur while building or running the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Two text commands declare the same alias.
    #[error("Failed to register commands: {0}")]
    Registration(#[from] AliasConflict),

    /// `run` was called while the event loop was already running.
    #[error("Runtime is already running")]
    AlreadyRunning,
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
