#![allow(clippy::cast_possible_truncation, clippy::unreadable_literal)]
use econd_core::{format_hex_word, Word};
use econd_io::{run, Error, InputFormat, RunConfig, RunSummary};
use econd_packet::header::{DEFAULT_HEADER_MARKER, DEFAULT_IDLE_PATTERN};
use econd_packet::{verify_header_crc, DecoderConfig, EventHeader};
use std::io::Write;
use std::path::Path;
use tempfile::{Builder, NamedTempFile};

const IDLE: Word = DEFAULT_IDLE_PATTERN << 8;
const EMPTY_ERX: Word = 0b111 << 29 | 1 << 25;

// Helper to create a packet with a correct header CRC
fn make_packet(payload: &[Word], truncated: bool) -> Vec<Word> {
    let header = EventHeader {
        marker: DEFAULT_HEADER_MARKER,
        payload_length: payload.len() as u16,
        truncated,
        bunch: 0x7ff,
        event: 3,
        ..EventHeader::default()
    };
    let [word0, word1] = header.to_words();
    let crc = verify_header_crc(word0, word1).calculated;
    let mut words = vec![word0, word1 | u32::from(crc)];
    words.extend_from_slice(payload);
    words.push(0);
    words
}

// Good packet, header with one flipped bit, undecodable packet, truncated packet
fn make_stream() -> Vec<Word> {
    let mut stream = vec![IDLE];
    stream.extend(make_packet(&[EMPTY_ERX, EMPTY_ERX], false));
    stream.push(IDLE);

    let mut corrupted = make_packet(&[EMPTY_ERX, EMPTY_ERX], false);
    corrupted[0] ^= 1 << 7;
    stream.extend(corrupted);

    stream.extend(make_packet(&[EMPTY_ERX], false));
    stream.extend(make_packet(&[], true));
    stream.push(IDLE);
    stream
}

fn expected_summary(words: usize) -> RunSummary {
    RunSummary {
        words,
        packets: 4,
        decoded: 3,
        truncated: 1,
        length_mismatches: 0,
        crc_failures: 1,
        failed: 1,
    }
}

fn write_file(suffix: &str, bytes: &[u8]) -> NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

fn hex_text(words: &[Word]) -> String {
    let mut text = String::from("# capture\n");
    for word in words {
        text.push_str(&format_hex_word(*word));
        text.push('\n');
    }
    text
}

fn run_to_string(config: &RunConfig) -> (RunSummary, String) {
    let mut out = Vec::new();
    let summary = run(config, &mut out).unwrap();
    (summary, String::from_utf8(out).unwrap())
}

#[test]
fn test_run_hex_text() {
    let stream = make_stream();
    let file = write_file(".txt", hex_text(&stream).as_bytes());

    let (summary, text) = run_to_string(&RunConfig::new(file.path()));
    assert_eq!(summary, expected_summary(stream.len()));

    assert!(text.contains("PACKET SUMMARY - Event 0"));
    assert!(text.contains("Header CRC: MISMATCH"));
    assert!(text.contains("flip Word0 bit 7"));
    assert!(text.contains("packet 2: decode failed"));
    assert!(text.contains("TRUNCATED PACKET"));
    assert!(text.contains("Empty eRx units (F=1): [9, 10]"));
}

#[test]
fn test_run_binary_matches_hex() {
    let stream = make_stream();
    let bytes: Vec<u8> = stream.iter().flat_map(|w| w.to_le_bytes()).collect();
    let file = write_file(".raw", &bytes);

    let (summary, _) = run_to_string(&RunConfig::new(file.path()));
    assert_eq!(summary, expected_summary(stream.len()));
}

#[test]
fn test_run_link_csv() {
    let stream = make_stream();
    let mut text = String::from("link0 link1 link2 link3 link4 link5 link6\n");
    for word in &stream {
        text.push_str(&format!(
            "{} 00000000 00000000 00000000 00000000 00000000 00000000\n",
            format_hex_word(*word)
        ));
    }
    let file = write_file(".csv", text.as_bytes());

    let (summary, _) = run_to_string(&RunConfig::new(file.path()));
    assert_eq!(summary, expected_summary(stream.len()));
}

#[test]
fn test_run_writes_csv() {
    let stream = make_stream();
    let input = write_file(".hex", hex_text(&stream).as_bytes());
    let output = NamedTempFile::new().unwrap();

    let mut config = RunConfig::new(input.path());
    config.csv_output = Some(output.path().to_path_buf());
    config.summaries = false;
    let (summary, text) = run_to_string(&config);
    assert!(text.is_empty());

    let csv = std::fs::read_to_string(output.path()).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 1 + summary.decoded);
    assert!(lines[0].starts_with("HeaderMarker,"));
    assert!(lines.iter().all(|l| l.split(',').count() == 15 + 12 * 44 + 1));
}

#[test]
fn test_run_options() {
    let stream = make_stream();
    let file = write_file(".dat", &stream.iter().flat_map(|w| w.to_le_bytes()).collect::<Vec<u8>>());

    let mut config = RunConfig::new(file.path());
    config.max_packets = Some(2);
    config.decoder = DecoderConfig::default().with_checks(false, false);
    let (summary, text) = run_to_string(&config);
    assert_eq!(summary.packets, 2);
    assert_eq!(summary.decoded, 2);
    assert_eq!(summary.crc_failures, 0);
    assert!(!text.contains("Header CRC"));
}

#[test]
fn test_run_explicit_format() {
    let stream = make_stream();
    let file = write_file(".log", hex_text(&stream).as_bytes());

    let mut config = RunConfig::new(file.path());
    assert!(matches!(
        run(&config, &mut Vec::new()),
        Err(Error::InvalidFormat(_))
    ));

    config.format = Some(InputFormat::HexText);
    let (summary, _) = run_to_string(&config);
    assert_eq!(summary.packets, 4);
}

#[test]
fn test_run_rejects_bad_config() {
    let file = write_file(".txt", b"");
    let mut config = RunConfig::new(file.path());
    config.decoder = DecoderConfig::default().with_active_links(vec![3, 12]);
    assert!(matches!(
        run(&config, &mut Vec::new()),
        Err(Error::PacketError(econd_packet::Error::ConfigError(_)))
    ));
}

#[test]
fn test_run_missing_file() {
    let config = RunConfig::new(Path::new("/nonexistent/capture.txt"));
    assert!(matches!(run(&config, &mut Vec::new()), Err(Error::Io(_))));
}
