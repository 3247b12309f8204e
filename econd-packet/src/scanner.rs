//! Packet boundary discovery in a flat word stream.

use crate::header::{IdleWord, DEFAULT_HEADER_MARKER, DEFAULT_IDLE_PATTERN};
use crate::DecoderConfig;
use econd_core::{field, Word};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Words in a packet besides its payload: two header words and the CRC.
pub const PACKET_OVERHEAD_WORDS: usize = 3;

/// How packet starts are recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    /// Any word carrying the header marker starts a packet.
    #[default]
    Marker,
    /// A header word only starts a packet right after an idle word.
    Idle,
}

/// Location of one packet in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketSpan {
    /// Index of header word 0.
    pub start: usize,
    /// Packet length in words, header and CRC included.
    pub len: usize,
}

impl PacketSpan {
    /// Index one past the CRC word.
    #[must_use]
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    /// The packet's words.
    #[must_use]
    pub fn slice<'a>(&self, words: &'a [Word]) -> &'a [Word] {
        &words[self.start..self.end()]
    }
}

/// True if `word` carries `marker` in bits `[31:23]`.
#[inline]
#[must_use]
pub fn is_header_word(word: Word, marker: u16) -> bool {
    field(word, 23, 9) == u32::from(marker)
}

/// Expected total packet length for a header word 0.
#[inline]
#[must_use]
pub fn packet_length(header_word0: Word) -> usize {
    field(header_word0, 14, 9) as usize + PACKET_OVERHEAD_WORDS
}

/// Scanner for ECON-D packets in a word stream.
#[derive(Debug, Clone)]
pub struct PacketScanner {
    marker: u16,
    framing: Framing,
    idle_pattern: u32,
}

impl Default for PacketScanner {
    fn default() -> Self {
        Self::new(DEFAULT_HEADER_MARKER)
    }
}

impl PacketScanner {
    /// Creates a marker-framed scanner.
    #[must_use]
    pub fn new(marker: u16) -> Self {
        Self {
            marker,
            framing: Framing::Marker,
            idle_pattern: DEFAULT_IDLE_PATTERN,
        }
    }

    /// Creates a scanner with the marker, framing and idle pattern of `config`.
    #[must_use]
    pub fn from_config(config: &DecoderConfig) -> Self {
        Self {
            marker: config.header_marker,
            framing: config.framing,
            idle_pattern: config.idle_pattern,
        }
    }

    /// Requires packets to follow an idle word with this pattern.
    #[must_use]
    pub fn with_idle_framing(mut self, idle_pattern: u32) -> Self {
        self.framing = Framing::Idle;
        self.idle_pattern = idle_pattern;
        self
    }

    fn is_packet_start(&self, words: &[Word], index: usize) -> bool {
        if !is_header_word(words[index], self.marker) {
            return false;
        }
        match self.framing {
            Framing::Marker => true,
            Framing::Idle => {
                index > 0 && IdleWord::matches(words[index - 1], self.idle_pattern)
            }
        }
    }

    /// Finds every complete packet in `words`.
    ///
    /// Each marker position starts a packet spanning `2 + PayloadLength + 1`
    /// words, so a header whose length field is corrupted upward cannot hide
    /// the packets that follow it. Spans may therefore overlap. A packet
    /// running past the end of the stream stops the scan with a warning and
    /// is dropped.
    #[must_use]
    pub fn scan(&self, words: &[Word]) -> Vec<PacketSpan> {
        let mut spans: Vec<PacketSpan> = Vec::new();
        let mut found_header = false;

        for (index, &word) in words.iter().enumerate() {
            if !self.is_packet_start(words, index) {
                continue;
            }
            found_header = true;

            let len = packet_length(word);
            let available = words.len() - index;
            if len > available {
                warn!(
                    "packet at word {index} truncated (needs {len} words, only {available} available)"
                );
                break;
            }

            if let Some(previous) = spans.last().filter(|span| index < span.end()) {
                debug!(
                    "packet at word {index} overlaps packet at word {}",
                    previous.start
                );
            }
            spans.push(PacketSpan { start: index, len });
        }

        if !found_header {
            warn!("no header markers found in data stream");
        }

        spans
    }

    /// Finds every complete packet and returns its words.
    #[must_use]
    pub fn packets<'a>(&self, words: &'a [Word]) -> Vec<&'a [Word]> {
        self.scan(words)
            .into_iter()
            .map(|span| span.slice(words))
            .collect()
    }
}
