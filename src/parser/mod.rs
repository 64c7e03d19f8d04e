//! Frame decoding module.
//!
//! Turns raw captured frames into the few fields needed to identify a flow,
//! stripping tunnel encapsulation on request. Nothing above the transport
//! header is looked at.

mod frame_parser;
mod tunnel;

pub use frame_parser::FrameParser;

#[cfg(test)]
pub(crate) use frame_parser::test_frames;

use std::net::IpAddr;

use pnet::packet::ip::IpNextHeaderProtocol;

use crate::domain::Endpoint;

/// Link-layer framing of the packets in a capture file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    Ethernet,
    /// Bare IPv4 or IPv6, version taken from the first nibble
    RawIp,
    /// Linux cooked capture (SLL)
    LinuxSll,
}

/// An IP header and whatever follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpLayer<'a> {
    pub src: IpAddr,
    pub dst: IpAddr,
    /// Transport protocol after any IPv6 extension headers
    pub protocol: IpNextHeaderProtocol,
    pub payload: &'a [u8],
}

impl IpLayer<'_> {
    /// Transport ports, `(0, 0)` for protocols without ports.
    pub fn ports(&self) -> Option<(u16, u16)> {
        frame_parser::transport_ports(self)
    }
}

/// Flow-identifying fields of a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowFields {
    pub src: Endpoint,
    pub dst: Endpoint,
    pub protocol: IpNextHeaderProtocol,
}
