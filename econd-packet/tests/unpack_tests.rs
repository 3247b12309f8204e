#![allow(
    clippy::cast_possible_truncation,
    clippy::unreadable_literal,
    clippy::uninlined_format_args
)]
use econd_core::Word;
use econd_packet::header::{DEFAULT_HEADER_MARKER, DEFAULT_IDLE_PATTERN};
use econd_packet::{
    encode_channel, unpack_packet, verify_header_crc, BitWriter, ChannelRecord, CompressionCode,
    DecoderConfig, Error, EventHeader, PacketScanner, PacketUnpacker, UnpackedPacket,
};

const IDLE: Word = DEFAULT_IDLE_PATTERN << 8;

// Helper to create an event header with a correct CRC
fn make_event_header(payload_length: usize, passthrough: bool, truncated: bool) -> [Word; 2] {
    let header = EventHeader {
        marker: DEFAULT_HEADER_MARKER,
        payload_length: payload_length as u16,
        passthrough,
        truncated,
        bunch: 0x123,
        event: 0x2a,
        orbit: 0x5,
        ..EventHeader::default()
    };
    let [word0, word1] = header.to_words();
    let crc = verify_header_crc(word0, word1).calculated;
    [word0, word1 | u32::from(crc)]
}

fn make_packet(payload: &[Word], passthrough: bool) -> Vec<Word> {
    let mut words = make_event_header(payload.len(), passthrough, false).to_vec();
    words.extend_from_slice(payload);
    words.push(0xc0ff_ee00);
    words
}

fn make_channel_map(channels: &[usize]) -> u64 {
    channels.iter().fold(0, |map, ch| map | 1 << (36 - ch))
}

// Full (F=0) sub-packet header with good Stat
fn make_subheader(cm0: u16, cm1: u16, channel_map: u64) -> [Word; 2] {
    let word0 = 0b111 << 29
        | u32::from(cm0) << 15
        | u32::from(cm1) << 5
        | (channel_map >> 32) as u32 & 0x1f;
    [word0, channel_map as u32]
}

fn make_empty_subheader(error: bool) -> Word {
    0b111 << 29 | 1 << 25 | u32::from(error) << 4
}

// Writes a full sub-packet: header, compressed channels, zero padding
fn write_erx(writer: &mut BitWriter, channels: &[(usize, CompressionCode, u16, u16, u16)]) {
    let map = make_channel_map(&channels.iter().map(|c| c.0).collect::<Vec<_>>());
    let [word0, word1] = make_subheader(0x155, 0x2aa, map);
    writer.push_word(word0);
    writer.push_word(word1);
    for &(_, code, adcm1, adc, toa) in channels {
        encode_channel(writer, code, adcm1, adc, toa);
    }
    writer.pad_to_word();
}

fn column(name: &str) -> usize {
    UnpackedPacket::column_names()
        .iter()
        .position(|c| c == name)
        .unwrap_or_else(|| panic!("no column {name}"))
}

fn two_erx_payload() -> Vec<Word> {
    let mut writer = BitWriter::new();
    write_erx(
        &mut writer,
        &[
            (0, CompressionCode::ZsPassed, 1, 2, 3),
            (5, CompressionCode::AdcOnly, 0, 100, 0),
            (36, CompressionCode::TotMode, 7, 8, 9),
        ],
    );
    writer.push_word(make_empty_subheader(false));
    writer.into_words()
}

#[test]
fn test_compressed_and_empty_erx() {
    let payload = two_erx_payload();
    // 2 header words, 32 + 16 + 32 data bits padded to 3 words, 1 empty header
    assert_eq!(payload.len(), 6);

    let packet = make_packet(&payload, false);
    let unpacked = unpack_packet(&packet, &DecoderConfig::default()).unwrap();

    assert!(!unpacked.length_mismatch);
    assert_eq!(unpacked.consumed_subpackets, 2);
    assert_eq!(unpacked.trailing_words, 0);
    assert_eq!(unpacked.channel_count(), 3);
    assert_eq!(unpacked.channels_with_data(9), vec![0, 5, 36]);
    assert_eq!(unpacked.crc, 0xc0ff_ee00);

    let erx9 = unpacked.subpackets[9].unwrap();
    assert!(!erx9.empty);
    assert_eq!(erx9.cm0, 0x155);
    assert_eq!(erx9.cm1, 0x2aa);
    assert_eq!(erx9.channel_map, 0x10_8000_0001);

    assert_eq!(unpacked.channels[9][0], Some(ChannelRecord::from_parts(0, 1, 2, 3)));
    assert_eq!(unpacked.channels[9][5], Some(ChannelRecord::from_parts(0, 0, 100, 0)));
    assert_eq!(unpacked.channels[9][36], Some(ChannelRecord::from_parts(0b11, 7, 8, 9)));

    assert!(unpacked.subpackets[10].is_some_and(|s| s.empty));
    assert!(unpacked.channels[10].iter().all(Option::is_none));
    assert!(unpacked.subpackets[0].is_none());
}

#[test]
fn test_every_code_in_one_erx() {
    let channels: Vec<(usize, CompressionCode, u16, u16, u16)> = CompressionCode::ALL
        .iter()
        .enumerate()
        .map(|(ch, &code)| (ch, code, 11, 22, 33))
        .collect();
    let mut writer = BitWriter::new();
    write_erx(&mut writer, &channels);
    let payload = writer.into_words();
    // 184 data bits padded to 192
    assert_eq!(payload.len(), 2 + 6);

    let config = DecoderConfig::default().with_active_links(vec![0]);
    let unpacked = unpack_packet(&make_packet(&payload, false), &config).unwrap();

    for (ch, code) in CompressionCode::ALL.iter().enumerate() {
        let fields = code.fields();
        let expected = ChannelRecord::from_parts(
            code.type_tag(),
            if fields.adcm1 { 11 } else { 0 },
            if fields.adc { 22 } else { 0 },
            if fields.toa { 33 } else { 0 },
        );
        assert_eq!(unpacked.channels[0][ch], Some(expected), "{code:?}");
    }
    assert_eq!(unpacked.trailing_words, 0);
}

#[test]
fn test_word_aligned_channels_need_no_padding() {
    let mut writer = BitWriter::new();
    write_erx(&mut writer, &[(17, CompressionCode::ZsPassed, 0x3ff, 0x200, 0x001)]);
    assert_eq!(writer.len_bits(), 3 * 32);
    let payload = writer.into_words();
    assert_eq!(payload.len(), 3);

    let config = DecoderConfig::default().with_active_links(vec![3]);
    let unpacked = unpack_packet(&make_packet(&payload, false), &config).unwrap();
    assert_eq!(unpacked.consumed_subpackets, 1);
    assert_eq!(unpacked.trailing_words, 0);
    assert_eq!(unpacked.channels_with_data(3), vec![17]);
    assert_eq!(
        unpacked.channels[3][17],
        Some(ChannelRecord::from_parts(0, 0x3ff, 0x200, 0x001))
    );
}

#[test]
fn test_nonzero_padding_is_an_error() {
    let mut writer = BitWriter::new();
    let [word0, word1] = make_subheader(0, 0, make_channel_map(&[3]));
    writer.push_word(word0);
    writer.push_word(word1);
    encode_channel(&mut writer, CompressionCode::AdcOnly, 0, 5, 0);
    writer.push(1, 16);

    let config = DecoderConfig::default().with_active_links(vec![2]);
    let err = unpack_packet(&make_packet(&writer.into_words(), false), &config).unwrap_err();
    assert!(
        matches!(err, Error::NonZeroPadding { erx: 2, bits: 16, value: 1 }),
        "{err}"
    );
}

#[test]
fn test_payload_exhausted() {
    // Map claims three channels, only one 32-bit record follows
    let [word0, word1] = make_subheader(0, 0, make_channel_map(&[0, 1, 2]));
    let payload = [word0, word1, 0x4000_0000];
    let config = DecoderConfig::default().with_active_links(vec![0]);
    let err = unpack_packet(&make_packet(&payload, false), &config).unwrap_err();
    assert!(matches!(err, Error::OutOfData { .. }), "{err}");
}

#[test]
fn test_missing_subpacket_is_an_error() {
    // Two links configured, one sub-packet sent
    let payload = [make_empty_subheader(false)];
    let err = unpack_packet(&make_packet(&payload, false), &DecoderConfig::default()).unwrap_err();
    assert!(matches!(err, Error::OutOfData { .. }));
}

#[test]
fn test_passthrough_from_header_and_override() {
    let [word0, word1] = make_subheader(0, 0, make_channel_map(&[2, 3]));
    let payload = [word0, word1, 0xdead_beef, 0x1234_5678];
    let config = DecoderConfig::default().with_active_links(vec![4]);

    let raw = unpack_packet(&make_packet(&payload, true), &config).unwrap();
    assert_eq!(raw.channels[4][2], Some(ChannelRecord(0xdead_beef)));
    assert_eq!(raw.channels[4][3], Some(ChannelRecord(0x1234_5678)));

    let forced = config.clone().with_passthrough(Some(true));
    let raw = unpack_packet(&make_packet(&payload, false), &forced).unwrap();
    assert_eq!(raw.channels[4][3], Some(ChannelRecord(0x1234_5678)));

    // Decoded as compressed, 0x12345678 no longer comes through verbatim
    let compressed = config.with_passthrough(Some(false));
    let result = unpack_packet(&make_packet(&payload, true), &compressed);
    assert!(result.map_or(true, |p| p.channels[4][3] != Some(ChannelRecord(0x1234_5678))));
}

#[test]
fn test_trailing_words_counted() {
    let config = DecoderConfig::default().with_active_links(vec![9]);
    let unpacked = unpack_packet(&make_packet(&two_erx_payload(), false), &config).unwrap();
    assert_eq!(unpacked.consumed_subpackets, 1);
    assert_eq!(unpacked.trailing_words, 1);
    assert!(unpacked.subpackets[10].is_none());
}

#[test]
fn test_length_mismatch_still_decodes() {
    let payload = two_erx_payload();
    let mut packet = make_event_header(2, false, false).to_vec();
    packet.extend_from_slice(&payload);
    packet.push(0);

    let unpacked = unpack_packet(&packet, &DecoderConfig::default()).unwrap();
    assert!(unpacked.length_mismatch);
    assert_eq!(unpacked.channel_count(), 3);
}

#[test]
fn test_truncated_packet_has_no_data() {
    let mut packet = make_event_header(0, false, true).to_vec();
    packet.push(0x0bad_0bad);
    let unpacked = unpack_packet(&packet, &DecoderConfig::default()).unwrap();
    assert!(unpacked.header.truncated);
    assert_eq!(unpacked.consumed_subpackets, 0);
    assert_eq!(unpacked.channel_count(), 0);
}

#[test]
fn test_row_cells() {
    let packet = make_packet(&two_erx_payload(), false);
    let row = unpack_packet(&packet, &DecoderConfig::default())
        .unwrap()
        .to_row();

    assert_eq!(row.len(), UnpackedPacket::column_names().len());
    assert_eq!(row[column("HeaderMarker")], "0x1e6");
    assert_eq!(row[column("PayloadLength")], "6");
    assert_eq!(row[column("BXNum")], "291");
    assert_eq!(row[column("eRx09_Stat")], "7");
    assert_eq!(row[column("eRx09_F")], "0");
    assert_eq!(row[column("eRx09_CM0")], "155");
    assert_eq!(row[column("eRx09_ChMap")], "1080000001");
    assert_eq!(row[column("eRx09_ChData05")], format!("{:032b}", 100 << 10));
    assert_eq!(row[column("eRx09_ChData06")], "");
    assert_eq!(row[column("eRx10_F")], "1");
    assert_eq!(row[column("eRx10_ChMap")], "0000000000");
    assert_eq!(row[column("eRx00_Stat")], "");
    assert_eq!(row[column("CRC")], "c0ffee00");
}

#[test]
fn test_stream_scan_and_unpack() {
    let mut stream = vec![IDLE, IDLE];
    stream.extend(make_packet(&two_erx_payload(), false));
    stream.push(IDLE);
    stream.extend(make_event_header(0, false, true));
    stream.push(0);
    stream.push(IDLE);

    let packets = PacketScanner::default().packets(&stream);
    assert_eq!(packets.len(), 2);
    assert_eq!(packets[0].len(), 9);
    assert_eq!(packets[1].len(), 3);

    for packet in &packets {
        assert!(verify_header_crc(packet[0], packet[1]).is_valid);
    }

    let results = PacketUnpacker::new(DecoderConfig::default()).unpack_all(&packets);
    assert_eq!(results.len(), 2);
    let first = results[0].as_ref().unwrap();
    assert_eq!(first.channel_count(), 3);
    let second = results[1].as_ref().unwrap();
    assert!(second.header.truncated);
}

#[test]
fn test_parallel_matches_sequential() {
    let good = make_packet(&two_erx_payload(), false);
    let bad = make_packet(&[make_empty_subheader(false)], false);
    let packets: Vec<&[Word]> = (0..64)
        .map(|i| if i % 7 == 0 { bad.as_slice() } else { good.as_slice() })
        .collect();

    let sequential = PacketUnpacker::new(DecoderConfig::default().with_parallel(false));
    let parallel = PacketUnpacker::new(DecoderConfig::default().with_parallel_threshold(8));

    let a = sequential.unpack_all(&packets);
    let b = parallel.unpack_all(&packets);
    assert_eq!(a.len(), b.len());
    for (i, (x, y)) in a.iter().zip(&b).enumerate() {
        match (x, y) {
            (Ok(x), Ok(y)) => assert_eq!(x, y),
            (Err(_), Err(_)) => assert_eq!(i % 7, 0),
            _ => panic!("packet {i} differs"),
        }
    }
}
