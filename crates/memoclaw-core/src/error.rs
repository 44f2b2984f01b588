//! MemoClaw error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MemoClawError>;

/// Workspace-wide error type.
#[derive(Error, Debug)]
pub enum MemoClawError {
    /// Configuration missing or invalid. Fatal — aborts before any dispatch.
    #[error("Config error: {0}")]
    Config(String),

    /// Immich or ntfy transport failure or non-2xx response. Retryable.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// A user record carries no API credential. Not retryable.
    #[error("No API key configured for user '{0}'")]
    CredentialMissing(String),

    /// State file could not be read or written.
    #[error("State error: {0}")]
    State(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
