//! econd-packet: ECON-D event packet decoder.
//!
//! This crate decodes the bit-packed event packets an ECON-D concentrator
//! builds from HGCROC readout data.
//!
//! # Key Components
//!
//! - [`PacketScanner`] - Finds packet boundaries in a flat word stream
//! - [`EventHeader`] / [`SubPacketHeader`] - Fixed bit-field headers
//! - [`decode_compressed_channel`] - Variable-length channel record decoder
//! - [`PacketUnpacker`] - Full packet decode into [`UnpackedPacket`]
//! - [`verify_header_crc`] / [`find_corrupted_bits`] - Header CRC-8 checks
//!
//! # Processing Pipeline
//!
//! 1. Scan the word stream for header markers and slice out packets
//! 2. Unpack each packet: header, then every active eRx sub-packet
//! 3. Verify the header CRC, searching for bit flips on a mismatch

#![allow(clippy::cast_possible_truncation, clippy::module_name_repetitions)]

pub mod bits;
pub mod channel;
pub mod crc;
mod error;
pub mod header;
pub mod scanner;
pub mod summary;
pub mod unpack;

pub use bits::{BitCursor, BitWriter};
pub use channel::{
    decode_channel_map, decode_channel_map_hex, decode_compressed_channel, encode_channel,
    ChannelRecord, CompressionCode, DecodedChannel, CHANNELS_PER_ERX,
};
pub use crc::{find_corrupted_bits, verify_header_crc, BitFlip, BitFlipReport, CrcCheck};
pub use error::{Error, Result};
pub use header::{EventHeader, IdleWord, SubPacketHeader};
pub use scanner::{Framing, PacketScanner, PacketSpan};
pub use summary::PacketSummary;
pub use unpack::{unpack_packet, PacketUnpacker, UnpackedPacket, MAX_ERX};

use econd_core::parse_hex_word;
use header::{DEFAULT_HEADER_MARKER, DEFAULT_IDLE_PATTERN};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Decoder configuration for one hardware setup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// eRx slots (0-11) expected to carry sub-packets, in wire order.
    pub active_links: Vec<usize>,
    /// Header marker in bits `[31:23]` of event header word 0.
    pub header_marker: u16,
    /// Idle word pattern in bits `[31:8]`.
    pub idle_pattern: u32,
    /// Link columns of a capture CSV that carry the stream.
    pub etx_active: Vec<usize>,
    /// Packet start recognition.
    pub framing: Framing,
    /// Forces passthrough decoding on or off instead of following the
    /// header P flag.
    pub passthrough: Option<bool>,
    /// Verify the event header CRC.
    pub check_crc: bool,
    /// Search for bit flips when the CRC fails.
    pub search_bit_flips: bool,
    /// Unpack packets in parallel.
    pub parallel: bool,
    /// Minimum number of packets before going parallel.
    pub parallel_threshold: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            active_links: vec![9, 10],
            header_marker: DEFAULT_HEADER_MARKER,
            idle_pattern: DEFAULT_IDLE_PATTERN,
            etx_active: vec![0],
            framing: Framing::Marker,
            passthrough: None,
            check_crc: true,
            search_bit_flips: true,
            parallel: true,
            parallel_threshold: 1024,
        }
    }
}

// Intermediate structs for the JSON file schema
#[derive(Deserialize)]
struct JsonConfig {
    decoder: JsonDecoder,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct JsonDecoder {
    stream: JsonStream,
    unpacking: JsonUnpacking,
    checks: JsonChecks,
    parallel: JsonParallel,
}

#[derive(Deserialize)]
#[serde(default)]
struct JsonStream {
    header_marker: String,
    idle_pattern: String,
    framing: Framing,
    etx_active: Vec<usize>,
}

impl Default for JsonStream {
    fn default() -> Self {
        Self {
            header_marker: format!("{DEFAULT_HEADER_MARKER:#x}"),
            idle_pattern: format!("{DEFAULT_IDLE_PATTERN:#x}"),
            framing: Framing::Marker,
            etx_active: vec![0],
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct JsonUnpacking {
    active_links: Vec<usize>,
    passthrough: Option<bool>,
}

impl Default for JsonUnpacking {
    fn default() -> Self {
        Self {
            active_links: vec![9, 10],
            passthrough: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct JsonChecks {
    crc: bool,
    bit_flip_search: bool,
}

impl Default for JsonChecks {
    fn default() -> Self {
        Self {
            crc: true,
            bit_flip_search: true,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct JsonParallel {
    enabled: bool,
    threshold: usize,
}

impl Default for JsonParallel {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 1024,
        }
    }
}

impl DecoderConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the active eRx links.
    #[must_use]
    pub fn with_active_links(mut self, links: Vec<usize>) -> Self {
        self.active_links = links;
        self
    }

    /// Sets the header marker.
    #[must_use]
    pub fn with_header_marker(mut self, marker: u16) -> Self {
        self.header_marker = marker;
        self
    }

    /// Sets the packet framing.
    #[must_use]
    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    /// Sets the CRC and bit-flip checks.
    #[must_use]
    pub fn with_checks(mut self, check_crc: bool, search_bit_flips: bool) -> Self {
        self.check_crc = check_crc;
        self.search_bit_flips = search_bit_flips;
        self
    }

    /// Forces passthrough decoding on or off; `None` follows the header.
    #[must_use]
    pub fn with_passthrough(mut self, passthrough: Option<bool>) -> Self {
        self.passthrough = passthrough;
        self
    }

    /// Sets whether to unpack in parallel.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Sets the packet count above which unpacking goes parallel.
    #[must_use]
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Loads configuration from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// describes an invalid configuration.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let json_config: JsonConfig = serde_json::from_reader(reader)?;
        Self::from_json_config(json_config)
    }

    /// Loads configuration from a JSON string.
    ///
    /// # Errors
    /// Returns an error if the string is not valid JSON or describes an
    /// invalid configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let json_config: JsonConfig = serde_json::from_str(json)?;
        Self::from_json_config(json_config)
    }

    fn from_json_config(config: JsonConfig) -> Result<Self> {
        let decoder = config.decoder;

        let header_marker = parse_hex_word(&decoder.stream.header_marker)?;
        if header_marker > 0x1ff {
            return Err(Error::ConfigError(format!(
                "header marker {header_marker:#x} wider than 9 bits"
            )));
        }

        let config = Self {
            active_links: decoder.unpacking.active_links,
            header_marker: header_marker as u16,
            idle_pattern: parse_hex_word(&decoder.stream.idle_pattern)?,
            etx_active: decoder.stream.etx_active,
            framing: decoder.stream.framing,
            passthrough: decoder.unpacking.passthrough,
            check_crc: decoder.checks.crc,
            search_bit_flips: decoder.checks.bit_flip_search,
            parallel: decoder.parallel.enabled,
            parallel_threshold: decoder.parallel.threshold,
        };

        config.validate()?;

        Ok(config)
    }

    /// Checks links, marker and idle pattern ranges.
    ///
    /// Called when loading from JSON. For programmatically created
    /// configs, call this before decoding.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        for (i, &link) in self.active_links.iter().enumerate() {
            if link >= MAX_ERX {
                return Err(Error::ConfigError(format!(
                    "active link {link} out of range (0-{})",
                    MAX_ERX - 1
                )));
            }
            if self.active_links[..i].contains(&link) {
                return Err(Error::ConfigError(format!("active link {link} listed twice")));
            }
        }
        if self.header_marker > 0x1ff {
            return Err(Error::ConfigError(format!(
                "header marker {:#x} wider than 9 bits",
                self.header_marker
            )));
        }
        if self.idle_pattern > 0x00ff_ffff {
            return Err(Error::ConfigError(format!(
                "idle pattern {:#x} wider than 24 bits",
                self.idle_pattern
            )));
        }
        if self.etx_active.is_empty() {
            return Err(Error::ConfigError("no active eTx columns".to_string()));
        }
        Ok(())
    }
}
