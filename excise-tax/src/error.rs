//! Error types for excise tax calculation

use thiserror::Error;

/// Result type for excise operations
pub type Result<T> = std::result::Result<T, Error>;

/// Excise errors
#[derive(Debug, Error)]
pub enum Error {
    /// Rate table missing or malformed
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Negative or otherwise unusable barrel quantity
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Arithmetic overflow
    #[error("Calculation error: {0}")]
    Calculation(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
