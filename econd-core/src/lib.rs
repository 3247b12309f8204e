//! econd-core: Word types and bit-field helpers for ECON-D data.
//!
//! Every ECON-D stream is a flat sequence of 32-bit words, often captured as
//! 8-character hexadecimal strings. This crate provides the shared
//! conversions and masking helpers used by the packet decoder and the I/O
//! layer.

pub mod error;
pub mod word;

pub use error::{Error, Result};
pub use word::{field, format_hex_word, is_hex_word_token, mask, parse_hex_word, Word, WORD_BITS};
