//! Human-readable packet summaries.

use crate::channel::decode_channel_map;
use crate::crc::{BitFlipReport, CrcCheck};
use crate::header::{EventHeader, SubPacketHeader};
use crate::unpack::{UnpackedPacket, MAX_ERX};
use std::fmt;

const RULE_WIDTH: usize = 80;

/// Plain-text report of one unpacked packet.
#[derive(Debug, Clone, Copy)]
pub struct PacketSummary<'a> {
    pub index: usize,
    pub packet: &'a UnpackedPacket,
    pub crc: Option<CrcCheck>,
    pub bit_flips: Option<&'a BitFlipReport>,
}

impl<'a> PacketSummary<'a> {
    #[must_use]
    pub fn new(index: usize, packet: &'a UnpackedPacket) -> Self {
        Self {
            index,
            packet,
            crc: None,
            bit_flips: None,
        }
    }

    /// Adds the header CRC outcome.
    #[must_use]
    pub fn with_crc(mut self, check: CrcCheck) -> Self {
        self.crc = Some(check);
        self
    }

    /// Adds bit-flip candidates for a failed CRC.
    #[must_use]
    pub fn with_bit_flips(mut self, report: &'a BitFlipReport) -> Self {
        self.bit_flips = Some(report);
        self
    }

    /// eRx slots with a full sub-packet and at least one decoded channel.
    #[must_use]
    pub fn erx_with_data(&self) -> Vec<usize> {
        (0..MAX_ERX)
            .filter(|&erx| {
                self.packet.subpackets[erx].is_some_and(|s| !s.empty)
                    && !self.packet.channels_with_data(erx).is_empty()
            })
            .collect()
    }

    /// Empty (F=1) sub-packets.
    #[must_use]
    pub fn empty_erx(&self) -> Vec<(usize, SubPacketHeader)> {
        self.packet
            .subpackets
            .iter()
            .enumerate()
            .filter_map(|(erx, s)| s.filter(|s| s.empty).map(|s| (erx, s)))
            .collect()
    }

    fn fmt_crc(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(check) = self.crc else {
            return Ok(());
        };
        writeln!(f, "\n  Header CRC: {check}")?;
        if let Some(report) = self.bit_flips {
            if report.has_solution() {
                for candidate in report.single_bit_flips.iter().chain(&report.two_bit_flips) {
                    writeln!(f, "    {candidate}")?;
                }
            } else if !check.is_valid {
                writeln!(f, "    no 1- or 2-bit flip restores the CRC")?;
            }
        }
        Ok(())
    }

    fn fmt_erx(&self, f: &mut fmt::Formatter<'_>, erx: usize, s: &SubPacketHeader) -> fmt::Result {
        let active = decode_channel_map(s.channel_map);
        let with_data = self.packet.channels_with_data(erx);

        writeln!(f, "\n  eRx {erx:02}:")?;
        writeln!(f, "   Status: {:01x}", s.stat)?;
        writeln!(f, "   Hamming: {:01x}", s.ham)?;
        writeln!(f, "   CM0 (Common Mode 0): {:03x} = {}", s.cm0, s.cm0)?;
        writeln!(f, "   CM1 (Common Mode 1): {:03x} = {}", s.cm1, s.cm1)?;
        writeln!(f, "   Error: {}", u8::from(s.error))?;
        writeln!(f, "   ChMap: {:010x}", s.channel_map)?;
        writeln!(f, "   Active channels ({}): {active:?}", active.len())?;
        writeln!(f, "   Channels with data ({}): {with_data:?}", with_data.len())?;
        if with_data.len() != active.len() {
            writeln!(
                f,
                "   WARNING: ChMap indicates {} channels, but {} have data",
                active.len(),
                with_data.len()
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for PacketSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let heavy = "=".repeat(RULE_WIDTH);
        let light = "-".repeat(RULE_WIDTH);

        writeln!(f, "{heavy}")?;
        writeln!(f, "PACKET SUMMARY - Event {}", self.index)?;
        writeln!(f, "{heavy}")?;
        writeln!(f, "\n HEADER INFORMATION:")?;
        writeln!(f, "{light}")?;
        let header = &self.packet.header;
        for (name, cell) in EventHeader::FIELD_NAMES.iter().zip(header.to_cells()) {
            writeln!(f, "  {name:15}: {cell}")?;
        }
        self.fmt_crc(f)?;

        if header.truncated {
            return writeln!(f, "\n TRUNCATED PACKET - No data available");
        }

        writeln!(f, "\n{heavy}")?;
        writeln!(f, " eRx UNITS SUMMARY:")?;
        writeln!(f, "{heavy}")?;

        let with_data = self.erx_with_data();
        for &erx in &with_data {
            if let Some(s) = &self.packet.subpackets[erx] {
                self.fmt_erx(f, erx, s)?;
            }
        }

        writeln!(f, "\n{light}")?;
        if with_data.is_empty() {
            writeln!(f, " No eRx units with channel data")?;
        } else {
            writeln!(f, " Active eRx units with data: {with_data:?}")?;
        }

        let empty = self.empty_erx();
        if !empty.is_empty() {
            let slots: Vec<usize> = empty.iter().map(|(erx, _)| *erx).collect();
            writeln!(f, " Empty eRx units (F=1): {slots:?}")?;
            for (erx, s) in empty {
                writeln!(f, "   eRx{erx:02}: Status={:01x}, Hamming={:01x}", s.stat, s.ham)?;
            }
        }

        if self.packet.trailing_words > 0 {
            writeln!(f, " Trailing payload words: {}", self.packet.trailing_words)?;
        }
        Ok(())
    }
}
