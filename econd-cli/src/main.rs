//! econd CLI
//!
//! Decodes ECON-D event packets from capture files and checks header CRCs.
#![allow(clippy::uninlined_format_args, clippy::too_many_lines)]

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use econd_core::parse_hex_word;
use econd_io::{read_words, InputFormat, RunConfig};
use econd_packet::{
    decode_channel_map_hex, find_corrupted_bits, verify_header_crc, DecoderConfig, EventHeader,
    Framing, PacketScanner,
};
use log::LevelFilter;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    EcondIo(#[from] econd_io::Error),

    #[error("{0}")]
    Packet(#[from] econd_packet::Error),

    #[error("{0}")]
    Core(#[from] econd_core::Error),
}

/// Input layout selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    /// Whitespace-separated 8-digit hex words
    Hex,
    /// Space-separated link0..link6 columns
    Csv,
    /// Little-endian 32-bit binary
    Bin,
}

impl From<Format> for InputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Hex => InputFormat::HexText,
            Format::Csv => InputFormat::LinkCsv,
            Format::Bin => InputFormat::Binary,
        }
    }
}

/// Packet start recognition.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum FramingArg {
    /// Any header marker word starts a packet
    Marker,
    /// Header words must follow an idle word
    Idle,
}

impl From<FramingArg> for Framing {
    fn from(framing: FramingArg) -> Self {
        match framing {
            FramingArg::Marker => Framing::Marker,
            FramingArg::Idle => Framing::Idle,
        }
    }
}

/// ECON-D event packet decoder.
#[derive(Parser)]
#[command(name = "econd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode every packet of a capture file
    Decode {
        /// Capture file (.txt/.hex, .csv, .raw/.bin/.dat)
        input: PathBuf,

        /// Input format, detected from the extension if omitted
        #[arg(short, long, value_enum)]
        format: Option<Format>,

        /// JSON decoder configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Active eRx links in wire order
        #[arg(short, long, value_delimiter = ',')]
        links: Option<Vec<usize>>,

        /// Active eTx columns of a link CSV
        #[arg(long, value_delimiter = ',')]
        etx: Option<Vec<usize>>,

        /// Packet framing
        #[arg(long, value_enum)]
        framing: Option<FramingArg>,

        /// Write unpacked packets to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Decode at most this many packets
        #[arg(short = 'n', long)]
        max_packets: Option<usize>,

        /// Skip the header CRC check
        #[arg(long)]
        no_crc: bool,

        /// Skip the bit-flip search on CRC failures
        #[arg(long)]
        no_flip_search: bool,

        /// Print only the run totals
        #[arg(short, long)]
        quiet: bool,
    },

    /// Verify the CRC of an event header given as two hex words
    Crc {
        /// Header word 0 (hex)
        word0: String,

        /// Header word 1 (hex)
        word1: String,
    },

    /// Decode a hex channel map into active channel numbers
    Chmap {
        /// Channel map (hex, up to 37 bits)
        map: String,
    },

    /// Show word and packet counts of a capture file
    Info {
        /// Capture file
        input: PathBuf,

        /// Input format, detected from the extension if omitted
        #[arg(short, long, value_enum)]
        format: Option<Format>,

        /// JSON decoder configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Active eTx columns of a link CSV
        #[arg(long, value_delimiter = ',')]
        etx: Option<Vec<usize>>,

        /// Packet framing
        #[arg(long, value_enum)]
        framing: Option<FramingArg>,
    },
}

/// Loads the JSON configuration, if any, then applies stream options
/// given on the command line.
fn stream_config(
    config: Option<&Path>,
    etx: Option<Vec<usize>>,
    framing: Option<FramingArg>,
) -> Result<DecoderConfig> {
    let mut decoder = match config {
        Some(path) => DecoderConfig::from_file(path)?,
        None => DecoderConfig::default(),
    };
    if let Some(etx) = etx {
        decoder.etx_active = etx;
    }
    if let Some(framing) = framing {
        decoder.framing = framing.into();
    }
    decoder.validate()?;
    Ok(decoder)
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Decode {
            input,
            format,
            config,
            links,
            etx,
            framing,
            csv,
            max_packets,
            no_crc,
            no_flip_search,
            quiet,
        } => {
            let mut decoder = stream_config(config.as_deref(), etx, framing)?;
            if let Some(links) = links {
                decoder.active_links = links;
            }
            if no_crc {
                decoder.check_crc = false;
            }
            if no_flip_search {
                decoder.search_bit_flips = false;
            }

            let run_config = RunConfig {
                input,
                format: format.map(Into::into),
                decoder,
                csv_output: csv,
                max_packets,
                summaries: !quiet,
            };

            let start = Instant::now();
            let mut out = BufWriter::new(io::stdout().lock());
            let summary = econd_io::run(&run_config, &mut out)?;
            out.flush()?;
            drop(out);

            println!("Decoded in {:.2}s", start.elapsed().as_secs_f64());
            println!("{}", summary);
            if let Some(path) = &run_config.csv_output {
                println!("CSV written to: {}", path.display());
            }
        }

        Commands::Crc { word0, word1 } => {
            let word0 = parse_hex_word(&word0)?;
            let word1 = parse_hex_word(&word1)?;
            let header = EventHeader::from_words(word0, word1);

            println!("Header: 0x{:08x} 0x{:08x}", word0, word1);
            for (name, value) in header.named_fields() {
                println!("  {:15}: {:#x}", name, value);
            }

            let report = find_corrupted_bits(word0, word1);
            println!("CRC: {}", report.check);
            if !report.check.is_valid {
                if report.has_solution() {
                    println!("Candidate corrections:");
                    for candidate in report.single_bit_flips.iter().chain(&report.two_bit_flips) {
                        println!("  {}", candidate);
                    }
                } else {
                    println!("No 1- or 2-bit flip restores the CRC");
                }
            }
        }

        Commands::Chmap { map } => {
            let channels = decode_channel_map_hex(&map)?;
            println!("Active channels ({}): {:?}", channels.len(), channels);
        }

        Commands::Info {
            input,
            format,
            config,
            etx,
            framing,
        } => {
            let decoder = stream_config(config.as_deref(), etx, framing)?;
            let format = match format {
                Some(format) => format.into(),
                None => InputFormat::from_path(&input)?,
            };
            let words = read_words(&input, format, &decoder.etx_active)?;
            let packets = PacketScanner::from_config(&decoder).packets(&words);

            let truncated = packets
                .iter()
                .filter(|p| EventHeader::from_words(p[0], p[1]).truncated)
                .count();
            let crc_failures = packets
                .iter()
                .filter(|p| !verify_header_crc(p[0], p[1]).is_valid)
                .count();

            println!("File: {}", input.display());
            println!("Format: {:?}", format);
            println!("Words: {}", words.len());
            println!("Packets: {}", packets.len());
            println!("Truncated packets: {}", truncated);
            println!("Header CRC failures: {}", crc_failures);
            if let Some(first) = packets.first() {
                let header = EventHeader::from_words(first[0], first[1]);
                println!(
                    "First packet: {} words, BX {}, L1A {}, orbit {}",
                    first.len(),
                    header.bunch,
                    header.event,
                    header.orbit
                );
            }
        }
    }

    Ok(())
}
