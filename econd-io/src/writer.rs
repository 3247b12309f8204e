//! CSV writer for unpacked packets.

use crate::Result;
use econd_packet::UnpackedPacket;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes unpacked packets as one CSV row each.
///
/// The header line holds [`UnpackedPacket::column_names`]; every row has
/// the same width whichever eRx links were active.
pub struct UnpackedCsvWriter<W: Write> {
    writer: W,
    rows: usize,
}

impl UnpackedCsvWriter<BufWriter<File>> {
    /// Creates the file and writes the header line.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write> UnpackedCsvWriter<W> {
    /// Wraps a writer and writes the header line.
    ///
    /// # Errors
    /// Returns an error if the header cannot be written.
    pub fn new(mut writer: W) -> Result<Self> {
        writeln!(writer, "{}", UnpackedPacket::column_names().join(","))?;
        Ok(Self { writer, rows: 0 })
    }

    /// Writes one packet row.
    ///
    /// # Errors
    /// Returns an error if the row cannot be written.
    pub fn write_packet(&mut self, packet: &UnpackedPacket) -> Result<()> {
        writeln!(self.writer, "{}", packet.to_row().join(","))?;
        self.rows += 1;
        Ok(())
    }

    /// Number of packet rows written.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flushes and returns the inner writer.
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    pub fn into_inner(mut self) -> Result<W> {
        self.flush()?;
        Ok(self.writer)
    }
}
