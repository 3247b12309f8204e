//! Word-stream readers for capture files.
//!

use crate::{Error, Result};
use econd_core::{is_hex_word_token, parse_hex_word, Word};
use log::debug;
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Capture file layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// Whitespace-separated 8-digit hex words.
    HexText,
    /// Space-separated `link0..link6` columns with a header line.
    LinkCsv,
    /// Raw little-endian 32-bit words.
    Binary,
}

impl InputFormat {
    /// Picks a format from the file extension.
    ///
    /// # Errors
    /// Returns [`Error::InvalidFormat`] for unknown or missing extensions.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "txt" | "hex" => Ok(Self::HexText),
            "csv" => Ok(Self::LinkCsv),
            "raw" | "bin" | "dat" => Ok(Self::Binary),
            _ => Err(Error::InvalidFormat(format!(
                "cannot tell input format of {} from its extension",
                path.display()
            ))),
        }
    }
}

impl FromStr for InputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "hex" | "txt" => Ok(Self::HexText),
            "csv" => Ok(Self::LinkCsv),
            "bin" | "binary" | "raw" => Ok(Self::Binary),
            other => Err(Error::InvalidFormat(format!("unknown input format '{other}'"))),
        }
    }
}

/// A memory-mapped file reader.
pub struct MappedFileReader {
    mmap: Mmap,
    path: PathBuf,
}

impl MappedFileReader {
    /// Opens a file for memory-mapped reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| {
            Error::MmapError(format!("{}: {e}", path.as_ref().display()))
        })?;
        Ok(Self {
            mmap,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Returns the file contents as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap[..]
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Decodes the file as little-endian 32-bit words.
    ///
    /// # Errors
    /// Returns [`Error::InvalidFormat`] if the size is not a multiple of 4.
    pub fn words(&self) -> Result<Vec<Word>> {
        if !self.len().is_multiple_of(4) {
            return Err(Error::InvalidFormat(format!(
                "file size {} is not a multiple of 4 (file: {})",
                self.len(),
                self.path.display()
            )));
        }
        Ok(self
            .as_bytes()
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }
}

/// Extracts the words of a hex text dump.
///
/// Only tokens of exactly eight hex digits count as words; anything else
/// (addresses, comments, partial words) is skipped.
#[must_use]
pub fn parse_hex_text(text: &str) -> Vec<Word> {
    let mut skipped = 0usize;
    let words: Vec<Word> = text
        .split_whitespace()
        .filter_map(|token| {
            if is_hex_word_token(token) {
                parse_hex_word(token).ok()
            } else {
                skipped += 1;
                None
            }
        })
        .collect();
    if skipped > 0 {
        debug!("skipped {skipped} non-word tokens");
    }
    words
}

/// Builds the word stream of a link CSV capture.
///
/// The first line is a header. Each row holds hex words in columns
/// `link0..link6`; the `etx_active` columns of a row are taken in reverse
/// order and rows are concatenated.
///
/// # Errors
/// Returns [`Error::InvalidFormat`] if a row lacks an active column or a
/// cell is not a hex word.
pub fn parse_link_csv(text: &str, etx_active: &[usize]) -> Result<Vec<Word>> {
    let mut words = Vec::new();
    for (line_number, line) in text.lines().enumerate().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let cells: Vec<&str> = line.split_whitespace().collect();
        for &column in etx_active.iter().rev() {
            let cell = cells.get(column).ok_or_else(|| {
                Error::InvalidFormat(format!(
                    "line {}: no link{column} column",
                    line_number + 1
                ))
            })?;
            let word = parse_hex_word(cell).map_err(|e| {
                Error::InvalidFormat(format!("line {}: {e}", line_number + 1))
            })?;
            words.push(word);
        }
    }
    Ok(words)
}

/// Reads a capture file into a flat word stream.
///
/// # Errors
/// Returns an error if the file cannot be read or does not match `format`.
pub fn read_words(path: &Path, format: InputFormat, etx_active: &[usize]) -> Result<Vec<Word>> {
    let words = match format {
        InputFormat::HexText => parse_hex_text(&std::fs::read_to_string(path)?),
        InputFormat::LinkCsv => parse_link_csv(&std::fs::read_to_string(path)?, etx_active)?,
        InputFormat::Binary => MappedFileReader::open(path)?.words()?,
    };
    debug!("read {} words from {}", words.len(), path.display());
    Ok(words)
}
