//! Event header CRC-8 verification and bit-flip diagnostics.
//!
//! The header CRC covers the non-Hamming bits of word 0 (`[31:6]`) and the
//! non-CRC bits of word 1 (`[31:8]`), reassembled into a 64-bit base
//! `8 zeros | word0[31:6] | 6 zeros | word1[31:8]` and fed MSB first
//! through CRC-8 with polynomial `0x1A7`.

use crc::Crc;
use econd_core::Word;
use log::{debug, warn};
use std::fmt;

/// CRC-8, x^8+x^7+x^5+x^2+x+1, no reflection, zero init and xorout.
pub const CRC8_ECOND: crc::Algorithm<u8> = crc::Algorithm {
    width: 8,
    poly: 0xa7,
    init: 0x00,
    refin: false,
    refout: false,
    xorout: 0x00,
    check: 0x76,
    residue: 0x00,
};

static HEADER_CRC: Crc<u8> = Crc::<u8>::new(&CRC8_ECOND);

/// Word 0 bits covered by the CRC.
pub const WORD0_COVERED: std::ops::Range<u8> = 6..32;

/// Word 1 bits covered by the CRC.
pub const WORD1_COVERED: std::ops::Range<u8> = 8..32;

/// Builds the 64-bit CRC base from the two header words.
#[must_use]
pub fn crc_base(word0: Word, word1: Word) -> u64 {
    let word0_data = u64::from((word0 >> 6) & 0x03ff_ffff);
    let word1_data = u64::from((word1 >> 8) & 0x00ff_ffff);
    (word0_data << 30) | word1_data
}

/// CRC-8 of a 64-bit value, big-endian byte order.
#[must_use]
pub fn crc8(value: u64) -> u8 {
    HEADER_CRC.checksum(&value.to_be_bytes())
}

/// Outcome of a header CRC check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrcCheck {
    pub is_valid: bool,
    pub transmitted: u8,
    pub calculated: u8,
}

impl fmt::Display for CrcCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid {
            write!(f, "valid (0x{:02x})", self.transmitted)
        } else {
            write!(
                f,
                "MISMATCH (transmitted 0x{:02x}, calculated 0x{:02x})",
                self.transmitted, self.calculated
            )
        }
    }
}

/// Recomputes the header CRC and compares it with the transmitted byte.
#[must_use]
pub fn verify_header_crc(word0: Word, word1: Word) -> CrcCheck {
    let transmitted = (word1 & 0xff) as u8;
    let calculated = crc8(crc_base(word0, word1));
    CrcCheck {
        is_valid: transmitted == calculated,
        transmitted,
        calculated,
    }
}

/// Which header word a flipped bit belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderWord {
    Word0,
    Word1,
}

/// A single flipped bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitFlip {
    pub word: HeaderWord,
    pub bit: u8,
}

impl BitFlip {
    #[must_use]
    pub fn new(word: HeaderWord, bit: u8) -> Self {
        Self { word, bit }
    }

    fn apply(self, words: [Word; 2]) -> [Word; 2] {
        let mut out = words;
        match self.word {
            HeaderWord::Word0 => out[0] ^= 1 << self.bit,
            HeaderWord::Word1 => out[1] ^= 1 << self.bit,
        }
        out
    }
}

impl fmt::Display for BitFlip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = match self.word {
            HeaderWord::Word0 => 0,
            HeaderWord::Word1 => 1,
        };
        write!(f, "Word{word} bit {}", self.bit)
    }
}

/// A set of flips that makes the header CRC match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlipCandidate {
    pub flips: Vec<BitFlip>,
    pub corrected: [Word; 2],
    pub crc: u8,
}

impl fmt::Display for FlipCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let locations: Vec<String> = self.flips.iter().map(ToString::to_string).collect();
        write!(
            f,
            "flip {} -> 0x{:08x} 0x{:08x} (crc 0x{:02x})",
            locations.join(" and "),
            self.corrected[0],
            self.corrected[1],
            self.crc
        )
    }
}

/// Result of [`find_corrupted_bits`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitFlipReport {
    pub original: [Word; 2],
    pub check: CrcCheck,
    pub single_bit_flips: Vec<FlipCandidate>,
    pub two_bit_flips: Vec<FlipCandidate>,
}

impl BitFlipReport {
    /// True if any candidate correction was found.
    #[must_use]
    pub fn has_solution(&self) -> bool {
        !self.single_bit_flips.is_empty() || !self.two_bit_flips.is_empty()
    }
}

fn try_flips(words: [Word; 2], flips: &[BitFlip]) -> Option<FlipCandidate> {
    let corrected = flips.iter().fold(words, |acc, flip| flip.apply(acc));
    let check = verify_header_crc(corrected[0], corrected[1]);
    check.is_valid.then(|| FlipCandidate {
        flips: flips.to_vec(),
        corrected,
        crc: check.calculated,
    })
}

fn covered_bits() -> impl Iterator<Item = BitFlip> + Clone {
    WORD0_COVERED
        .map(|bit| BitFlip::new(HeaderWord::Word0, bit))
        .chain(WORD1_COVERED.map(|bit| BitFlip::new(HeaderWord::Word1, bit)))
}

/// Searches for bit flips in the CRC-covered header bits that would make
/// the transmitted CRC match.
///
/// All single-bit solutions are collected first. Only when there are none
/// are two-bit combinations tried: both bits in word 0, both in word 1,
/// then one in each word. Purely diagnostic; nothing is corrected.
#[must_use]
pub fn find_corrupted_bits(word0: Word, word1: Word) -> BitFlipReport {
    let words = [word0, word1];
    let check = verify_header_crc(word0, word1);
    let mut report = BitFlipReport {
        original: words,
        check,
        single_bit_flips: Vec::new(),
        two_bit_flips: Vec::new(),
    };

    if check.is_valid {
        return report;
    }

    warn!(
        "header CRC mismatch: transmitted=0x{:02x}, calculated=0x{:02x}",
        check.transmitted, check.calculated
    );
    debug!("searching single-bit flips");

    report.single_bit_flips = covered_bits()
        .filter_map(|flip| try_flips(words, &[flip]))
        .collect();

    if !report.single_bit_flips.is_empty() {
        return report;
    }

    debug!("no single-bit flip found, searching two-bit flips");

    for (word, range) in [
        (HeaderWord::Word0, WORD0_COVERED),
        (HeaderWord::Word1, WORD1_COVERED),
    ] {
        for first in range.clone() {
            for second in (first + 1)..range.end {
                let flips = [BitFlip::new(word, first), BitFlip::new(word, second)];
                report.two_bit_flips.extend(try_flips(words, &flips));
            }
        }
    }

    for bit0 in WORD0_COVERED {
        for bit1 in WORD1_COVERED {
            let flips = [
                BitFlip::new(HeaderWord::Word0, bit0),
                BitFlip::new(HeaderWord::Word1, bit1),
            ];
            report.two_bit_flips.extend(try_flips(words, &flips));
        }
    }

    report
}
