//! pcap file reader, with transparent gzip decompression.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use pcap_file::pcap::PcapReader;
use pcap_file::DataLink;

use super::{CaptureSource, PacketReader};
use crate::domain::CapturedPacket;
use crate::error::CaptureError;
use crate::filter::CaptureFilter;
use crate::parser::{FrameParser, LinkType};

/// Buffer size for reading capture files (64KB).
const BUFFER_SIZE: usize = 65536;

/// Gzip magic bytes.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Opens pcap files from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct PcapFileSource;

impl CaptureSource for PcapFileSource {
    fn open(
        &self,
        path: &Path,
        filter: Option<&CaptureFilter>,
    ) -> Result<Box<dyn PacketReader>, CaptureError> {
        let reader = PcapFileReader::open(path, filter.cloned())?;
        Ok(Box::new(reader))
    }
}

/// Reads one pcap file. `read_next` drops records that fail the filter.
pub struct PcapFileReader {
    reader: PcapReader<Box<dyn Read>>,
    parser: FrameParser,
    filter: Option<CaptureFilter>,
}

impl PcapFileReader {
    /// Open a pcap file for reading.
    ///
    /// Gzipped files are detected by their magic bytes and decompressed on
    /// the fly.
    pub fn open(path: &Path, filter: Option<CaptureFilter>) -> Result<Self, CaptureError> {
        let file = File::open(path).map_err(|source| CaptureError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let mut buf_reader = BufReader::with_capacity(BUFFER_SIZE, file);
        let is_gzipped = buf_reader
            .fill_buf()
            .map_err(|source| CaptureError::Open {
                path: path.to_path_buf(),
                source,
            })?
            .starts_with(&GZIP_MAGIC);

        let input: Box<dyn Read> = if is_gzipped {
            Box::new(BufReader::with_capacity(BUFFER_SIZE, GzDecoder::new(buf_reader)))
        } else {
            Box::new(buf_reader)
        };

        let reader = PcapReader::new(input).map_err(|e| CaptureError::Format {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let link = link_type_for(reader.header().datalink);
        if link.is_none() {
            tracing::warn!(
                "{}: unsupported link type {:?}, decoding as Ethernet",
                path.display(),
                reader.header().datalink
            );
        }

        Ok(Self {
            reader,
            parser: FrameParser::new(link.unwrap_or(LinkType::Ethernet)),
            filter,
        })
    }
}

impl PacketReader for PcapFileReader {
    fn read_record(&mut self) -> Result<Option<CapturedPacket>, CaptureError> {
        let Some(result) = self.reader.next_packet() else {
            return Ok(None);
        };
        let packet = result.map_err(|e| CaptureError::Read(e.to_string()))?;
        Ok(Some(CapturedPacket::new(
            packet.timestamp,
            packet.orig_len,
            packet.data.into_owned(),
        )))
    }

    fn admits(&self, packet: &CapturedPacket) -> bool {
        self.filter
            .as_ref()
            .map_or(true, |filter| filter.matches(&self.parser, &packet.data))
    }

    fn link_type(&self) -> LinkType {
        self.parser.link_type()
    }
}

fn link_type_for(datalink: DataLink) -> Option<LinkType> {
    match datalink {
        DataLink::ETHERNET => Some(LinkType::Ethernet),
        DataLink::RAW => Some(LinkType::RawIp),
        DataLink::LINUX_SLL => Some(LinkType::LinuxSll),
        _ => None,
    }
}
