//! Capture file access.
//!
//! This module defines the `CaptureSource` and `PacketReader` traits the
//! extraction engine reads through, a pcap file implementation of both, and
//! the `CaptureWriter` that frames accepted packets into the output file.

mod pcap_reader;
mod pcap_writer;

pub use pcap_reader::{PcapFileReader, PcapFileSource};
pub use pcap_writer::{CaptureWriter, MAX_RECORD_SIZE};

use std::path::Path;
use std::time::Duration;

use crate::domain::CapturedPacket;
use crate::error::CaptureError;
use crate::filter::CaptureFilter;
use crate::parser::LinkType;

/// A stream of packet records from one capture file.
pub trait PacketReader {
    /// Read the next record in file order, filtered or not.
    ///
    /// Returns `Ok(None)` at end of file. An `Err` concerns a single record;
    /// the caller may keep reading.
    fn read_record(&mut self) -> Result<Option<CapturedPacket>, CaptureError>;

    /// Whether `packet` passes the read-layer filter the reader was opened
    /// with.
    fn admits(&self, _packet: &CapturedPacket) -> bool {
        true
    }

    /// Link-layer framing of the records.
    fn link_type(&self) -> LinkType;

    /// Read the next record that passes the read-layer filter.
    fn read_next(&mut self) -> Result<Option<CapturedPacket>, CaptureError> {
        while let Some(packet) = self.read_record()? {
            if self.admits(&packet) {
                return Ok(Some(packet));
            }
        }
        Ok(None)
    }
}

/// Opens capture files for reading (Dependency Inversion Principle).
///
/// Lets the engine run against real files or against in-memory captures in
/// tests.
pub trait CaptureSource {
    /// Open `path`, applying `filter` at the read layer if given.
    fn open(
        &self,
        path: &Path,
        filter: Option<&CaptureFilter>,
    ) -> Result<Box<dyn PacketReader>, CaptureError>;
}

/// A reader that can look at its first unread record without consuming it.
///
/// The engine probes the start of the next rotation file through this and
/// then scans the same handle, so each file is opened exactly once. The peek
/// sees the raw first record: a file the filter drops entirely still reports
/// when it starts.
pub struct PeekableReader {
    inner: Box<dyn PacketReader>,
    peeked: Option<CapturedPacket>,
}

impl PeekableReader {
    pub fn new(inner: Box<dyn PacketReader>) -> Self {
        Self {
            inner,
            peeked: None,
        }
    }

    /// Timestamp of the next record, reading it ahead if needed.
    ///
    /// The read-layer filter is not applied. `Ok(None)` means the file holds
    /// no (more) records.
    pub fn peek_timestamp(&mut self) -> Result<Option<Duration>, CaptureError> {
        if self.peeked.is_none() {
            self.peeked = self.inner.read_record()?;
        }
        Ok(self.peeked.as_ref().map(|p| p.timestamp))
    }
}

impl PacketReader for PeekableReader {
    fn read_record(&mut self) -> Result<Option<CapturedPacket>, CaptureError> {
        match self.peeked.take() {
            Some(packet) => Ok(Some(packet)),
            None => self.inner.read_record(),
        }
    }

    fn admits(&self, packet: &CapturedPacket) -> bool {
        self.inner.admits(packet)
    }

    fn link_type(&self) -> LinkType {
        self.inner.link_type()
    }
}
