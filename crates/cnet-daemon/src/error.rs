//! Error types returned by daemon capabilities.

use thiserror::Error;

/// Result type alias for daemon capability calls.
pub type DaemonResult<T> = Result<T, DaemonError>;

/// Failures a daemon subsystem can report.
///
/// Absence of a looked-up resource is not an error; capabilities that look
/// something up return `Ok(None)` instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DaemonError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("resource exhausted: {0}")]
    Exhausted(String),

    /// Failure the subsystem does not classify further.
    #[error("{0}")]
    Other(String),
}
