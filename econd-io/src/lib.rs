//! econd-io: Word-stream input, CSV output and the decode pipeline.
//!
//! Captures arrive as hex text dumps, space-separated link CSV files or
//! raw little-endian binary. Binary files are read through memmap2.
//!

mod error;
mod reader;
pub mod run;
mod writer;

pub use error::{Error, Result};
pub use reader::{parse_hex_text, parse_link_csv, read_words, InputFormat, MappedFileReader};
pub use run::{run, RunConfig, RunSummary};
pub use writer::UnpackedCsvWriter;
