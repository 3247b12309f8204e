//! Bit cursor over a slice of 32-bit words.
//!
//! ECON-D payloads are read MSB first: bit 0 of the stream is bit 31 of the
//! first word. Records freely straddle word boundaries.

use crate::{Error, Result};
use econd_core::{mask, Word, WORD_BITS};

/// Read cursor over a word slice.
#[derive(Debug, Clone)]
pub struct BitCursor<'a> {
    words: &'a [Word],
    position: usize,
}

impl<'a> BitCursor<'a> {
    /// Creates a cursor at the first bit of `words`.
    #[must_use]
    pub fn new(words: &'a [Word]) -> Self {
        Self { words, position: 0 }
    }

    /// Current bit offset from the start of the stream.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Total number of bits in the stream.
    #[must_use]
    pub fn len_bits(&self) -> usize {
        self.words.len() * WORD_BITS as usize
    }

    /// Bits left to read.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.len_bits() - self.position
    }

    /// Whole words left after the cursor (rounded down).
    #[must_use]
    pub fn remaining_words(&self) -> usize {
        self.remaining() / WORD_BITS as usize
    }

    /// True if the cursor sits on a word boundary.
    #[must_use]
    pub fn is_word_aligned(&self) -> bool {
        self.position % WORD_BITS as usize == 0
    }

    /// Number of bits up to the next word boundary (0 when aligned).
    #[must_use]
    pub fn padding_to_word(&self) -> u32 {
        let offset = (self.position % WORD_BITS as usize) as u32;
        (WORD_BITS - offset) % WORD_BITS
    }

    fn ensure(&self, n: u32) -> Result<()> {
        if n as usize > self.remaining() {
            return Err(Error::OutOfData {
                needed: n,
                position: self.position,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    /// Returns the next `n` bits (at most 32) without advancing.
    ///
    /// # Errors
    /// Returns [`Error::OutOfData`] if fewer than `n` bits remain.
    pub fn peek(&self, n: u32) -> Result<u32> {
        debug_assert!(n <= WORD_BITS);
        self.ensure(n)?;
        if n == 0 {
            return Ok(0);
        }

        let index = self.position / WORD_BITS as usize;
        let offset = (self.position % WORD_BITS as usize) as u32;
        let high = u64::from(self.words[index]);
        let low = u64::from(self.words.get(index + 1).copied().unwrap_or(0));
        let window = (high << 32) | low;

        Ok(((window >> (64 - offset - n)) as u32) & mask(n))
    }

    /// Reads the next `n` bits (at most 32) and advances.
    ///
    /// # Errors
    /// Returns [`Error::OutOfData`] if fewer than `n` bits remain.
    pub fn read(&mut self, n: u32) -> Result<u32> {
        let value = self.peek(n)?;
        self.position += n as usize;
        Ok(value)
    }

    /// Advances by `n` bits without reading them.
    ///
    /// # Errors
    /// Returns [`Error::OutOfData`] if fewer than `n` bits remain.
    pub fn skip(&mut self, n: u32) -> Result<()> {
        self.ensure(n)?;
        self.position += n as usize;
        Ok(())
    }
}

/// MSB-first bit writer, the inverse of [`BitCursor`].
///
/// Used to build synthetic payloads and compressed channel records.
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    words: Vec<Word>,
    bits: usize,
}

impl BitWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bits written so far.
    #[must_use]
    pub fn len_bits(&self) -> usize {
        self.bits
    }

    /// Appends the low `width` bits of `value` (at most 32).
    pub fn push(&mut self, value: u32, width: u32) {
        debug_assert!(width <= WORD_BITS);
        for i in (0..width).rev() {
            let bit = (value >> i) & 1;
            let offset = self.bits % WORD_BITS as usize;
            if offset == 0 {
                self.words.push(0);
            }
            if bit == 1 {
                if let Some(last) = self.words.last_mut() {
                    *last |= 1 << (WORD_BITS as usize - 1 - offset);
                }
            }
            self.bits += 1;
        }
    }

    /// Appends a whole word.
    pub fn push_word(&mut self, word: Word) {
        self.push(word, WORD_BITS);
    }

    /// Zero-pads to the next word boundary.
    pub fn pad_to_word(&mut self) {
        let offset = (self.bits % WORD_BITS as usize) as u32;
        if offset != 0 {
            self.push(0, WORD_BITS - offset);
        }
    }

    /// Finishes writing, zero-padding the final word.
    #[must_use]
    pub fn into_words(mut self) -> Vec<Word> {
        self.pad_to_word();
        self.words
    }
}
