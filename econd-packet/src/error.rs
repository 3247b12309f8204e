//! ECON-D packet error types.

use thiserror::Error;

/// Result type for packet decoding operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Packet decoding error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Packet too short to hold a header and CRC word.
    #[error("invalid packet: {0}")]
    InvalidPacket(String),

    /// Channel compression code outside the known table.
    #[error("unknown compression code {code:#b} ({width} bits)")]
    UnknownCompressionCode { code: u8, width: u8 },

    /// The payload ended before a field could be read.
    #[error("out of data: needed {needed} bits at bit {position}, only {available} left")]
    OutOfData {
        needed: u32,
        position: usize,
        available: usize,
    },

    /// Sub-packet padding to the next word boundary was not all zero.
    #[error("eRx {erx}: expected {bits} zero padding bits, got {value:#b}")]
    NonZeroPadding { erx: usize, bits: u32, value: u32 },

    /// Bit cursor not word aligned after a sub-packet.
    #[error("eRx {erx}: bit cursor {position} not 32-bit aligned")]
    Misaligned { erx: usize, position: usize },

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// JSON configuration parsing error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] econd_core::Error),
}
