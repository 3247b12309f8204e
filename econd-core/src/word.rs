//! 32-bit word helpers.

use crate::{Error, Result};

/// The atomic unit of an ECON-D stream.
pub type Word = u32;

/// Number of bits in a [`Word`].
pub const WORD_BITS: u32 = 32;

/// Low-bit mask of the given width (saturates at 32 bits).
#[inline]
#[must_use]
pub const fn mask(width: u32) -> u32 {
    if width >= WORD_BITS {
        u32::MAX
    } else {
        (1 << width) - 1
    }
}

/// Extracts `width` bits of `word` starting at bit `shift`.
#[inline]
#[must_use]
pub const fn field(word: Word, shift: u32, width: u32) -> u32 {
    (word >> shift) & mask(width)
}

/// Parses a hexadecimal word.
///
/// Accepts an optional `0x`/`0X` prefix and either case.
///
/// # Errors
/// Returns [`Error::InvalidHexWord`] if the string is empty, contains
/// non-hex characters or does not fit in 32 bits.
pub fn parse_hex_word(s: &str) -> Result<Word> {
    let trimmed = s.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::InvalidHexWord(s.to_string()));
    }

    u32::from_str_radix(digits, 16).map_err(|_| Error::InvalidHexWord(s.to_string()))
}

/// Formats a word as 8 lowercase hex characters.
#[must_use]
pub fn format_hex_word(word: Word) -> String {
    format!("{word:08x}")
}

/// True if `token` is exactly 8 hex characters (the capture-file format).
#[must_use]
pub fn is_hex_word_token(token: &str) -> bool {
    token.len() == 8 && token.bytes().all(|b| b.is_ascii_hexdigit())
}
