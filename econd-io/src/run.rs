//! End-to-end decode of one capture file.

use crate::reader::{read_words, InputFormat};
use crate::writer::UnpackedCsvWriter;
use crate::Result;
use econd_packet::{
    find_corrupted_bits, verify_header_crc, DecoderConfig, PacketScanner, PacketSummary,
    PacketUnpacker,
};
use log::{error, info};
use std::fmt;
use std::io::Write;
use std::path::PathBuf;

/// Inputs and outputs of a decode run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input: PathBuf,
    /// Input layout, detected from the extension when `None`.
    pub format: Option<InputFormat>,
    pub decoder: DecoderConfig,
    /// Where to write the unpacked CSV, if anywhere.
    pub csv_output: Option<PathBuf>,
    /// Decode at most this many packets.
    pub max_packets: Option<usize>,
    /// Write a text summary of every packet.
    pub summaries: bool,
}

impl RunConfig {
    /// A run over `input` with default decoding and per-packet summaries.
    #[must_use]
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            format: None,
            decoder: DecoderConfig::default(),
            csv_output: None,
            max_packets: None,
            summaries: true,
        }
    }
}

/// Counts gathered over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub words: usize,
    pub packets: usize,
    pub decoded: usize,
    pub truncated: usize,
    pub length_mismatches: usize,
    pub crc_failures: usize,
    pub failed: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} words, {} packets: {} decoded ({} truncated), {} failed, {} CRC failures, {} length mismatches",
            self.words,
            self.packets,
            self.decoded,
            self.truncated,
            self.failed,
            self.crc_failures,
            self.length_mismatches
        )
    }
}

/// Reads, scans and unpacks a capture, writing summaries to `out`.
///
/// A packet that fails to decode is logged and counted; the run goes on
/// with the next one. CRC mismatches are reported, never fatal.
///
/// # Errors
/// Returns an error if the configuration is invalid, the input cannot be
/// read or an output cannot be written.
pub fn run<W: Write>(config: &RunConfig, out: &mut W) -> Result<RunSummary> {
    config.decoder.validate()?;

    let format = match config.format {
        Some(format) => format,
        None => InputFormat::from_path(&config.input)?,
    };
    let words = read_words(&config.input, format, &config.decoder.etx_active)?;

    let scanner = PacketScanner::from_config(&config.decoder);
    let mut packets = scanner.packets(&words);
    if let Some(max) = config.max_packets {
        packets.truncate(max);
    }
    info!("found {} packets in {} words", packets.len(), words.len());

    let mut summary = RunSummary {
        words: words.len(),
        packets: packets.len(),
        ..RunSummary::default()
    };

    let unpacker = PacketUnpacker::new(config.decoder.clone());
    let results = unpacker.unpack_all(&packets);

    let mut csv = config
        .csv_output
        .as_ref()
        .map(UnpackedCsvWriter::create)
        .transpose()?;

    for (index, (packet, result)) in packets.iter().zip(results).enumerate() {
        let check = config
            .decoder
            .check_crc
            .then(|| verify_header_crc(packet[0], packet[1]));
        let flips = match check {
            Some(check) if !check.is_valid => {
                summary.crc_failures += 1;
                config
                    .decoder
                    .search_bit_flips
                    .then(|| find_corrupted_bits(packet[0], packet[1]))
            }
            _ => None,
        };

        let unpacked = match result {
            Ok(unpacked) => unpacked,
            Err(e) => {
                error!("packet {index}: {e}");
                summary.failed += 1;
                if config.summaries {
                    writeln!(out, "packet {index}: decode failed: {e}")?;
                }
                continue;
            }
        };

        summary.decoded += 1;
        if unpacked.header.truncated {
            summary.truncated += 1;
        }
        if unpacked.length_mismatch {
            summary.length_mismatches += 1;
        }

        if config.summaries {
            let mut packet_summary = PacketSummary::new(index, &unpacked);
            if let Some(check) = check {
                packet_summary = packet_summary.with_crc(check);
            }
            if let Some(report) = &flips {
                packet_summary = packet_summary.with_bit_flips(report);
            }
            writeln!(out, "{packet_summary}")?;
        }
        if let Some(csv) = csv.as_mut() {
            csv.write_packet(&unpacked)?;
        }
    }

    if let Some(mut csv) = csv {
        csv.flush()?;
        info!("wrote {} CSV rows", csv.rows());
    }

    info!("{summary}");
    Ok(summary)
}
