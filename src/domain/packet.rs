use std::time::Duration;

/// A packet record as read from a capture file.
///
/// `data` holds the captured bytes, so the captured length is `data.len()`;
/// `orig_len` is the length the packet had on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPacket {
    /// Time since the Unix epoch
    pub timestamp: Duration,
    pub orig_len: u32,
    pub data: Vec<u8>,
}

impl CapturedPacket {
    pub fn new(timestamp: Duration, orig_len: u32, data: Vec<u8>) -> Self {
        Self {
            timestamp,
            orig_len,
            data,
        }
    }
}
