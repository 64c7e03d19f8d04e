//! Read-layer capture filter.
//!
//! A `CaptureFilter` is a conjunction of BPF-style primitives. It renders as
//! BPF text for logs and is evaluated in-process against the outermost IP
//! header of each frame, so it never sees inside a tunnel.

mod builder;

pub use builder::build_filter;

use std::fmt;
use std::net::IpAddr;

use pnet::packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};

use crate::domain::has_ports;
use crate::parser::FrameParser;

/// One filter primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    /// `tcp`, `udp`, `proto 47`, ...
    Protocol(IpNextHeaderProtocol),
    /// `host <addr>`: source or destination
    Host(IpAddr),
    /// `port <n>`: source or destination
    Port(u16),
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Primitive::Protocol(p) => match p {
                IpNextHeaderProtocols::Tcp => write!(f, "tcp"),
                IpNextHeaderProtocols::Udp => write!(f, "udp"),
                IpNextHeaderProtocols::Sctp => write!(f, "sctp"),
                IpNextHeaderProtocols::Icmp => write!(f, "icmp"),
                IpNextHeaderProtocols::Icmpv6 => write!(f, "icmp6"),
                other => write!(f, "proto {}", other.0),
            },
            Primitive::Host(addr) => write!(f, "host {}", addr),
            Primitive::Port(port) => write!(f, "port {}", port),
        }
    }
}

/// All primitives must hold for a frame to pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFilter {
    primitives: Vec<Primitive>,
}

impl CaptureFilter {
    pub fn new(primitives: Vec<Primitive>) -> Self {
        Self { primitives }
    }

    /// Evaluate the filter on a raw frame.
    ///
    /// Frames without an IP header never pass.
    pub fn matches(&self, parser: &FrameParser, frame: &[u8]) -> bool {
        let Some(layer) = parser.outer_ip(frame) else {
            return false;
        };
        let ports = layer.ports();

        self.primitives.iter().all(|primitive| match *primitive {
            Primitive::Protocol(p) => layer.protocol == p,
            Primitive::Host(addr) => layer.src == addr || layer.dst == addr,
            Primitive::Port(port) => {
                has_ports(layer.protocol)
                    && ports.is_some_and(|(src, dst)| src == port || dst == port)
            }
        })
    }
}

impl fmt::Display for CaptureFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, primitive) in self.primitives.iter().enumerate() {
            if i > 0 {
                write!(f, " and ")?;
            }
            write!(f, "{}", primitive)?;
        }
        Ok(())
    }
}
