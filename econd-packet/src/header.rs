//! Event header, eRx sub-packet header and idle word layouts.

use crate::Result;
use econd_core::{field, parse_hex_word, Word};

/// Default ECON-D event header marker (bits `[31:23]` of header word 0).
pub const DEFAULT_HEADER_MARKER: u16 = 0x1e6;

/// Default idle pattern (bits `[31:8]` of an idle word).
pub const DEFAULT_IDLE_PATTERN: u32 = 0x0012_7ccc;

/// Decoded two-word ECON-D event header.
///
/// Word 0: `marker[31:23] length[22:14] P[13] E[12] HT[11:10] EBO[9:8]
/// M[7] T[6] hamming[5:0]`.
/// Word 1: `bx[31:20] l1a[19:14] orbit[13:11] S[10] RR[9:8] crc[7:0]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventHeader {
    /// Header marker (9 bits).
    pub marker: u16,
    /// Number of payload words between the header and the CRC word.
    pub payload_length: u16,
    /// P: channel data is passed through uncompressed.
    pub passthrough: bool,
    /// E: expected-event flag.
    pub expected: bool,
    /// HT (2 bits).
    pub ht: u8,
    /// EBO (2 bits).
    pub ebo: u8,
    /// M flag.
    pub m: bool,
    /// T: packet truncated, payload dropped.
    pub truncated: bool,
    /// Header Hamming bits (6 bits).
    pub hamming: u8,
    /// Bunch crossing number (12 bits).
    pub bunch: u16,
    /// Event (L1A) number (6 bits).
    pub event: u8,
    /// Orbit number (3 bits).
    pub orbit: u8,
    /// S: sync / sub-packet error flag.
    pub sync: bool,
    /// RR (2 bits).
    pub rr: u8,
    /// Transmitted header CRC (8 bits).
    pub crc: u8,
}

impl EventHeader {
    /// Column names of the flat tuple form, in [`EventHeader::fields`] order.
    pub const FIELD_NAMES: [&'static str; 15] = [
        "HeaderMarker",
        "PayloadLength",
        "P",
        "E",
        "HT",
        "EBO",
        "M",
        "T",
        "HdrHamming",
        "BXNum",
        "L1ANum",
        "OrbNum",
        "S",
        "RR",
        "HdrCRC",
    ];

    /// Decodes the two header words.
    #[must_use]
    pub fn from_words(word0: Word, word1: Word) -> Self {
        Self {
            marker: field(word0, 23, 9) as u16,
            payload_length: field(word0, 14, 9) as u16,
            passthrough: field(word0, 13, 1) == 1,
            expected: field(word0, 12, 1) == 1,
            ht: field(word0, 10, 2) as u8,
            ebo: field(word0, 8, 2) as u8,
            m: field(word0, 7, 1) == 1,
            truncated: field(word0, 6, 1) == 1,
            hamming: field(word0, 0, 6) as u8,
            bunch: field(word1, 20, 12) as u16,
            event: field(word1, 14, 6) as u8,
            orbit: field(word1, 11, 3) as u8,
            sync: field(word1, 10, 1) == 1,
            rr: field(word1, 8, 2) as u8,
            crc: field(word1, 0, 8) as u8,
        }
    }

    /// Decodes header words given as hex strings.
    ///
    /// # Errors
    /// Returns an error if either string is not a valid hex word.
    pub fn from_hex(word0: &str, word1: &str) -> Result<Self> {
        Ok(Self::from_words(parse_hex_word(word0)?, parse_hex_word(word1)?))
    }

    /// True if the header carries `marker`.
    #[must_use]
    pub fn has_marker(&self, marker: u16) -> bool {
        self.marker == marker
    }

    /// Packs the fields back into the two header words.
    #[must_use]
    pub fn to_words(&self) -> [Word; 2] {
        let word0 = (u32::from(self.marker) & 0x1ff) << 23
            | (u32::from(self.payload_length) & 0x1ff) << 14
            | u32::from(self.passthrough) << 13
            | u32::from(self.expected) << 12
            | (u32::from(self.ht) & 0x3) << 10
            | (u32::from(self.ebo) & 0x3) << 8
            | u32::from(self.m) << 7
            | u32::from(self.truncated) << 6
            | u32::from(self.hamming) & 0x3f;
        let word1 = (u32::from(self.bunch) & 0xfff) << 20
            | (u32::from(self.event) & 0x3f) << 14
            | (u32::from(self.orbit) & 0x7) << 11
            | u32::from(self.sync) << 10
            | (u32::from(self.rr) & 0x3) << 8
            | u32::from(self.crc);
        [word0, word1]
    }

    /// Flat tuple form: values in [`EventHeader::FIELD_NAMES`] order.
    #[must_use]
    pub fn fields(&self) -> [u32; 15] {
        [
            u32::from(self.marker),
            u32::from(self.payload_length),
            u32::from(self.passthrough),
            u32::from(self.expected),
            u32::from(self.ht),
            u32::from(self.ebo),
            u32::from(self.m),
            u32::from(self.truncated),
            u32::from(self.hamming),
            u32::from(self.bunch),
            u32::from(self.event),
            u32::from(self.orbit),
            u32::from(self.sync),
            u32::from(self.rr),
            u32::from(self.crc),
        ]
    }

    /// Named `(column, value)` pairs of the flat tuple form.
    pub fn named_fields(&self) -> impl Iterator<Item = (&'static str, u32)> {
        Self::FIELD_NAMES.into_iter().zip(self.fields())
    }

    /// Cells for row output; the marker is rendered as hex.
    #[must_use]
    pub fn to_cells(&self) -> Vec<String> {
        self.named_fields()
            .map(|(name, value)| {
                if name == "HeaderMarker" {
                    format!("{value:#x}")
                } else {
                    value.to_string()
                }
            })
            .collect()
    }
}

/// Decoded eRx sub-packet header.
///
/// Word 0: `Stat[31:29] Ham[28:26] F[25] CM0[24:15] CM1[14:5] E[4]
/// ChMap[36:32] in [4:0]`; when F=0 word 1 holds `ChMap[31:0]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubPacketHeader {
    /// Status bits (3 bits, `0b111` is good).
    pub stat: u8,
    /// Hamming bits (3 bits).
    pub ham: u8,
    /// F: empty sub-packet, single header word and no channel data.
    pub empty: bool,
    /// Common-mode sum 0 (10 bits).
    pub cm0: u16,
    /// Common-mode sum 1 (10 bits).
    pub cm1: u16,
    /// E: only set for empty sub-packets; the Stat error bits caused the
    /// suppression.
    pub error: bool,
    /// 37-bit channel map, zero for empty sub-packets.
    pub channel_map: u64,
}

impl SubPacketHeader {
    /// Column suffixes of the flat form, in [`SubPacketHeader::to_cells`] order.
    pub const FIELD_NAMES: [&'static str; 7] = ["Stat", "Ham", "F", "CM0", "CM1", "E", "ChMap"];

    /// Stat value of a healthy sub-packet.
    pub const STAT_GOOD: u8 = 0b111;

    /// Decodes a sub-packet header.
    ///
    /// `word1` supplies the low 32 channel-map bits; pass 0 for empty
    /// sub-packets.
    #[must_use]
    pub fn from_words(word0: Word, word1: Word) -> Self {
        let empty = field(word0, 25, 1) == 1;
        Self {
            stat: field(word0, 29, 3) as u8,
            ham: field(word0, 26, 3) as u8,
            empty,
            cm0: field(word0, 15, 10) as u16,
            cm1: field(word0, 5, 10) as u16,
            error: empty && field(word0, 4, 1) == 1,
            channel_map: (u64::from(field(word0, 0, 5)) << 32) | u64::from(word1),
        }
    }

    /// True if the F flag in a prospective sub-header word marks it empty.
    #[must_use]
    pub fn is_empty_word(word0: Word) -> bool {
        field(word0, 25, 1) == 1
    }

    /// Number of header words on the wire.
    #[must_use]
    pub fn word_count(&self) -> usize {
        if self.empty {
            1
        } else {
            2
        }
    }

    /// True when all three Stat bits are set.
    #[must_use]
    pub fn stat_ok(&self) -> bool {
        self.stat == Self::STAT_GOOD
    }

    /// Hex cells in [`SubPacketHeader::FIELD_NAMES`] order.
    #[must_use]
    pub fn to_cells(&self) -> [String; 7] {
        [
            format!("{:01x}", self.stat),
            format!("{:01x}", self.ham),
            format!("{:01x}", u8::from(self.empty)),
            format!("{:03x}", self.cm0),
            format!("{:03x}", self.cm1),
            format!("{:01x}", u8::from(self.error)),
            format!("{:010x}", self.channel_map),
        ]
    }
}

/// Decoded idle word sent between packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleWord {
    /// Idle pattern (bits `[31:8]`).
    pub pattern: u32,
    /// Ready/reset bits (`[7:6]`).
    pub rr: u8,
    /// Error bits (`[5:3]`).
    pub err: u8,
    /// Buffer status (`[2:0]`).
    pub buffer_status: u8,
}

impl IdleWord {
    /// Splits a word into idle fields, whatever its content.
    #[must_use]
    pub fn from_word(word: Word) -> Self {
        Self {
            pattern: word >> 8,
            rr: field(word, 6, 2) as u8,
            err: field(word, 3, 3) as u8,
            buffer_status: field(word, 0, 3) as u8,
        }
    }

    /// True if `word` carries the given idle pattern.
    #[must_use]
    pub fn matches(word: Word, pattern: u32) -> bool {
        word >> 8 == pattern
    }
}
