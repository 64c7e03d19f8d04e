//! Output capture file writer.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use pcap_file::pcap::{PcapHeader, PcapPacket, PcapWriter};
use pcap_file::{DataLink, Endianness, TsResolution};

use crate::domain::CapturedPacket;
use crate::error::OutputError;

/// Snap length declared in the output header.
pub const MAX_RECORD_SIZE: u32 = 65536;

/// Writes accepted packets, unmodified and in order, into a pcap container.
pub struct CaptureWriter<W: Write> {
    writer: PcapWriter<W>,
    records: u64,
}

impl CaptureWriter<BufWriter<File>> {
    /// Create (or truncate) the output file and write its header.
    pub fn create(path: &Path) -> Result<Self, OutputError> {
        let file = File::create(path).map_err(|source| OutputError::Create {
            path: path.to_path_buf(),
            source,
        })?;
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write> CaptureWriter<W> {
    /// Write the container header to `writer`.
    pub fn new(writer: W) -> Result<Self, OutputError> {
        let writer = PcapWriter::with_header(writer, output_header())
            .map_err(|e| OutputError::Write(e.to_string()))?;
        Ok(Self { writer, records: 0 })
    }

    /// Append one record with its original timestamp and lengths.
    pub fn write_record(&mut self, packet: &CapturedPacket) -> Result<(), OutputError> {
        let record = PcapPacket::new(packet.timestamp, packet.orig_len, &packet.data);
        self.writer
            .write_packet(&record)
            .map_err(|e| OutputError::Write(e.to_string()))?;
        self.records += 1;
        Ok(())
    }

    /// Records written so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(self) -> Result<W, OutputError> {
        let mut inner = self.writer.into_writer();
        inner
            .flush()
            .map_err(|e| OutputError::Write(e.to_string()))?;
        Ok(inner)
    }
}

/// Nanosecond resolution keeps any input timestamp exact.
fn output_header() -> PcapHeader {
    PcapHeader {
        version_major: 2,
        version_minor: 4,
        ts_correction: 0,
        ts_accuracy: 0,
        snaplen: MAX_RECORD_SIZE,
        datalink: DataLink::ETHERNET,
        ts_resolution: TsResolution::NanoSecond,
        endianness: Endianness::native(),
    }
}
