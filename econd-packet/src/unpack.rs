//! Full packet unpacking into header, sub-packet and channel records.

use crate::bits::BitCursor;
use crate::channel::{
    decode_channel_map, decode_compressed_channel, ChannelRecord, CHANNELS_PER_ERX,
};
use crate::header::{EventHeader, SubPacketHeader};
use crate::scanner::PACKET_OVERHEAD_WORDS;
use crate::{DecoderConfig, Error, Result};
use econd_core::{format_hex_word, Word, WORD_BITS};
use log::{debug, trace, warn};
use rayon::prelude::*;

/// eRx slots in an ECON-D packet.
pub const MAX_ERX: usize = 12;

/// A decoded packet with a fixed slot for every eRx and channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpackedPacket {
    /// Raw event header words.
    pub header_words: [Word; 2],
    pub header: EventHeader,
    /// Sub-packet headers, `None` for eRx slots that were not read.
    pub subpackets: [Option<SubPacketHeader>; MAX_ERX],
    /// Decoded channel records per eRx slot.
    pub channels: [[Option<ChannelRecord>; CHANNELS_PER_ERX]; MAX_ERX],
    /// Trailing CRC word.
    pub crc: Word,
    /// Number of sub-packets read from the payload.
    pub consumed_subpackets: usize,
    /// Whole payload words left after the last active link.
    pub trailing_words: usize,
    /// Header payload length differs from the words present.
    pub length_mismatch: bool,
}

impl UnpackedPacket {
    fn empty(header_words: [Word; 2], crc: Word) -> Self {
        Self {
            header_words,
            header: EventHeader::from_words(header_words[0], header_words[1]),
            subpackets: [None; MAX_ERX],
            channels: [[None; CHANNELS_PER_ERX]; MAX_ERX],
            crc,
            consumed_subpackets: 0,
            trailing_words: 0,
            length_mismatch: false,
        }
    }

    /// Channels of `erx` that hold a decoded record.
    #[must_use]
    pub fn channels_with_data(&self, erx: usize) -> Vec<usize> {
        self.channels[erx]
            .iter()
            .enumerate()
            .filter_map(|(channel, record)| record.map(|_| channel))
            .collect()
    }

    /// Total number of decoded channel records.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.iter().flatten().filter(|r| r.is_some()).count()
    }

    /// Column names of [`UnpackedPacket::to_row`].
    #[must_use]
    pub fn column_names() -> Vec<String> {
        let mut columns: Vec<String> = EventHeader::FIELD_NAMES
            .iter()
            .map(ToString::to_string)
            .collect();
        for erx in 0..MAX_ERX {
            columns.extend(
                SubPacketHeader::FIELD_NAMES
                    .iter()
                    .map(|name| format!("eRx{erx:02}_{name}")),
            );
            columns.extend((0..CHANNELS_PER_ERX).map(|ch| format!("eRx{erx:02}_ChData{ch:02}")));
        }
        columns.push("CRC".to_string());
        columns
    }

    /// Flat row with the same cells for every eRx slot, active or not.
    ///
    /// Empty slots are empty strings, channel records are 32-character
    /// binary strings and sub-header fields are hex.
    #[must_use]
    pub fn to_row(&self) -> Vec<String> {
        let mut row = self.header.to_cells();
        for erx in 0..MAX_ERX {
            match &self.subpackets[erx] {
                Some(subpacket) => row.extend(subpacket.to_cells()),
                None => row.extend(vec![String::new(); SubPacketHeader::FIELD_NAMES.len()]),
            }
            row.extend(
                self.channels[erx]
                    .iter()
                    .map(|record| record.map(ChannelRecord::to_bit_string).unwrap_or_default()),
            );
        }
        row.push(format_hex_word(self.crc));
        row
    }
}

fn unpack_subpacket(
    cursor: &mut BitCursor<'_>,
    erx: usize,
    passthrough: bool,
    packet: &mut UnpackedPacket,
) -> Result<()> {
    if erx >= MAX_ERX {
        return Err(Error::ConfigError(format!(
            "active link {erx} out of range (0-{})",
            MAX_ERX - 1
        )));
    }

    let word0 = cursor.read(WORD_BITS)?;
    let subpacket = if SubPacketHeader::is_empty_word(word0) {
        SubPacketHeader::from_words(word0, 0)
    } else {
        let word1 = cursor.read(WORD_BITS)?;
        SubPacketHeader::from_words(word0, word1)
    };
    trace!("eRx {erx}: {subpacket:?}");

    if !subpacket.stat_ok() {
        warn!("eRx {erx}: bad sub-packet status {:03b}", subpacket.stat);
    }

    packet.subpackets[erx] = Some(subpacket);
    packet.consumed_subpackets += 1;

    if subpacket.empty {
        return Ok(());
    }

    let mut bits_consumed = 0u32;
    for channel in decode_channel_map(subpacket.channel_map) {
        let decoded = decode_compressed_channel(cursor, passthrough)?;
        trace!(
            "eRx {erx} ch {channel}: {:?} {:08x}",
            decoded.code,
            decoded.record.raw()
        );
        packet.channels[erx][channel] = Some(decoded.record);
        bits_consumed += decoded.bits_consumed;
    }

    let padding = (WORD_BITS - bits_consumed % WORD_BITS) % WORD_BITS;
    let value = cursor.read(padding)?;
    if value != 0 {
        return Err(Error::NonZeroPadding {
            erx,
            bits: padding,
            value,
        });
    }
    if !cursor.is_word_aligned() {
        return Err(Error::Misaligned {
            erx,
            position: cursor.position(),
        });
    }

    Ok(())
}

/// Unpacks one packet (header, payload and CRC word).
///
/// A packet with the T flag set decodes to its header alone, whatever its
/// payload holds. Otherwise each link in `config.active_links` is read in
/// order from the payload bit stream.
///
/// # Errors
/// Returns an error if the packet is shorter than header plus CRC, an
/// active link is not a valid eRx slot, the payload runs out, a channel
/// code is unknown or sub-packet padding is not zero.
pub fn unpack_packet(packet: &[Word], config: &DecoderConfig) -> Result<UnpackedPacket> {
    if packet.len() < PACKET_OVERHEAD_WORDS {
        return Err(Error::InvalidPacket(format!(
            "{} words, need at least {PACKET_OVERHEAD_WORDS}",
            packet.len()
        )));
    }

    let crc = packet[packet.len() - 1];
    let payload = &packet[2..packet.len() - 1];
    let mut unpacked = UnpackedPacket::empty([packet[0], packet[1]], crc);
    let header = unpacked.header;

    if !header.has_marker(config.header_marker) {
        warn!("bad header marker {:#x}", header.marker);
    }
    if usize::from(header.payload_length) != payload.len() {
        warn!(
            "payload length {} does not match {} payload words",
            header.payload_length,
            payload.len()
        );
        unpacked.length_mismatch = true;
    }

    if header.truncated {
        if !payload.is_empty() {
            debug!("truncated packet carries {} payload words, ignored", payload.len());
        }
        return Ok(unpacked);
    }

    let passthrough = config.passthrough.unwrap_or(header.passthrough);
    let mut cursor = BitCursor::new(payload);
    for &erx in &config.active_links {
        unpack_subpacket(&mut cursor, erx, passthrough, &mut unpacked)?;
    }

    unpacked.trailing_words = cursor.remaining_words();
    if unpacked.trailing_words > 0 {
        debug!(
            "{} payload words left after active links",
            unpacked.trailing_words
        );
    }

    Ok(unpacked)
}

/// Packet unpacker bound to one decoder configuration.
#[derive(Debug, Clone, Default)]
pub struct PacketUnpacker {
    config: DecoderConfig,
}

impl PacketUnpacker {
    /// Creates an unpacker with the given configuration.
    #[must_use]
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Unpacks one packet.
    ///
    /// # Errors
    /// See [`unpack_packet`].
    pub fn unpack(&self, packet: &[Word]) -> Result<UnpackedPacket> {
        unpack_packet(packet, &self.config)
    }

    /// Unpacks many packets, keeping input order and one result per packet.
    pub fn unpack_all(&self, packets: &[&[Word]]) -> Vec<Result<UnpackedPacket>> {
        if self.config.parallel && packets.len() > self.config.parallel_threshold {
            self.unpack_parallel(packets)
        } else {
            self.unpack_sequential(packets)
        }
    }

    fn unpack_sequential(&self, packets: &[&[Word]]) -> Vec<Result<UnpackedPacket>> {
        packets.iter().map(|packet| self.unpack(packet)).collect()
    }

    /// Packets are independent, so they unpack in parallel using rayon.
    fn unpack_parallel(&self, packets: &[&[Word]]) -> Vec<Result<UnpackedPacket>> {
        packets.par_iter().map(|packet| self.unpack(packet)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_schema() {
        let columns = UnpackedPacket::column_names();
        assert_eq!(columns.len(), 15 + MAX_ERX * (7 + 37) + 1);
        assert_eq!(columns[15], "eRx00_Stat");
        assert_eq!(columns[21], "eRx00_ChMap");
        assert_eq!(columns[22], "eRx00_ChData00");
        assert_eq!(columns[15 + 44], "eRx01_Stat");
        assert_eq!(columns.last().map(String::as_str), Some("CRC"));
    }

    #[test]
    fn test_too_short() {
        let err = unpack_packet(&[0xf300_0000, 0], &DecoderConfig::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidPacket(_)));
    }

    #[test]
    fn test_truncated_ignores_payload() {
        // T=1, payload length 0, yet junk words follow
        let packet = [0xf300_0040, 0x0100_40d6, 0xdead_beef, 0x1234_5678];
        let unpacked = unpack_packet(&packet, &DecoderConfig::default()).unwrap();
        assert!(unpacked.header.truncated);
        assert!(unpacked.length_mismatch);
        assert_eq!(unpacked.consumed_subpackets, 0);
        assert_eq!(unpacked.channel_count(), 0);
        assert!(unpacked.subpackets.iter().all(Option::is_none));
        assert_eq!(unpacked.crc, 0x1234_5678);

        let row = unpacked.to_row();
        assert_eq!(row.len(), UnpackedPacket::column_names().len());
        assert!(row[15..row.len() - 1].iter().all(String::is_empty));
        assert_eq!(row.last().map(String::as_str), Some("12345678"));
    }

    #[test]
    fn test_link_out_of_range() {
        let empty = 0b111 << 29 | 1 << 25;
        let packet = [0xf300_4000, 0, empty, 0];
        for link in [MAX_ERX, 99] {
            let config = DecoderConfig::default().with_active_links(vec![link]);
            let err = unpack_packet(&packet, &config).unwrap_err();
            assert!(matches!(err, Error::ConfigError(_)), "{err}");
        }

        let unpacker = PacketUnpacker::new(DecoderConfig::default().with_active_links(vec![0, 12]));
        let results = unpacker.unpack_all(&[&packet[..]]);
        assert!(matches!(results[0], Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_empty_subpackets() {
        // Two F=1 sub-packets, Stat good
        let empty = 0b111 << 29 | 1 << 25;
        let packet = [0xf300_8000, 0x0000_0000, empty, empty | 1 << 4, 0];
        let unpacked = unpack_packet(&packet, &DecoderConfig::default()).unwrap();
        assert!(!unpacked.length_mismatch);
        assert_eq!(unpacked.consumed_subpackets, 2);
        assert!(unpacked.subpackets[9].is_some_and(|s| s.empty && !s.error));
        assert!(unpacked.subpackets[10].is_some_and(|s| s.empty && s.error));
        assert_eq!(unpacked.trailing_words, 0);
    }
}
