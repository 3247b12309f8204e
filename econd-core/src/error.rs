//! Error types for econd-core.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A string that should hold a 32-bit hex word does not.
    #[error("invalid hex word: {0:?}")]
    InvalidHexWord(String),
}
