//! Error types for the Jensen-Shannon metric.

use thiserror::Error;

/// Main error type for metric operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JsdError {
    /// Input batches disagree on shape
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },

    /// Invalid metric configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for metric operations.
pub type Result<T> = std::result::Result<T, JsdError>;
