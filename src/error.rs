//! Stockade error types and failure classification.
//!
//! Wrapped operations keep their own error types. The toolkit only needs to
//! know *what kind* of failure occurred to decide whether a retry is worth
//! it, which is what [`Classify`] and [`FailureKind`] express.

use std::io;

use serde::Deserialize;

/// Coarse classification of a failed backend call.
///
/// Populated by the transport that produced the error rather than
/// recovered from its message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The backend refused the connection (not listening, restarting).
    ConnectionRefused,
    /// The call did not complete in time.
    Timeout,
    /// Anything else: bad input, missing rows, constraint violations.
    Other,
}

impl FailureKind {
    /// Whether this kind of failure is expected to clear up on its own.
    pub fn is_transient(self) -> bool {
        matches!(self, FailureKind::ConnectionRefused | FailureKind::Timeout)
    }
}

/// Errors that can report their [`FailureKind`].
pub trait Classify {
    fn failure_kind(&self) -> FailureKind;
}

impl Classify for io::Error {
    fn failure_kind(&self) -> FailureKind {
        match self.kind() {
            io::ErrorKind::ConnectionRefused => FailureKind::ConnectionRefused,
            io::ErrorKind::TimedOut => FailureKind::Timeout,
            _ => FailureKind::Other,
        }
    }
}

/// Stockade error types
#[derive(Debug, thiserror::Error)]
pub enum StockadeError {
    // Backend errors
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("backend error: {0}")]
    Backend(String),

    // Cache errors
    #[error("invalid invalidation pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Classify for StockadeError {
    fn failure_kind(&self) -> FailureKind {
        match self {
            StockadeError::ConnectionRefused(_) => FailureKind::ConnectionRefused,
            StockadeError::Timeout(_) => FailureKind::Timeout,
            _ => FailureKind::Other,
        }
    }
}

impl From<io::Error> for StockadeError {
    fn from(err: io::Error) -> Self {
        let msg = err.to_string();
        match err.failure_kind() {
            FailureKind::ConnectionRefused => StockadeError::ConnectionRefused(msg),
            FailureKind::Timeout => StockadeError::Timeout(msg),
            FailureKind::Other => StockadeError::Backend(msg),
        }
    }
}

/// Result type alias for Stockade operations
pub type Result<T> = std::result::Result<T, StockadeError>;
