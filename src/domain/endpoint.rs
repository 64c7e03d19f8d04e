//! Direction-agnostic flow identity.

use std::fmt;
use std::net::IpAddr;

use pnet::packet::ip::IpNextHeaderProtocol;

use super::flow::FlowDescriptor;
use super::protocol::{has_ports, parse_ip_protocol};
use crate::error::EndpointError;

/// One side of a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Endpoint {
    pub ip: IpAddr,
    pub port: u16,
}

impl Endpoint {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip, port }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip {
            IpAddr::V4(ip) => write!(f, "{}:{}", ip, self.port),
            IpAddr::V6(ip) => write!(f, "[{}]:{}", ip, self.port),
        }
    }
}

/// The two endpoints of a flow in canonical order, so that packets seen in
/// either direction map to the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointPair {
    low: Endpoint,
    high: Endpoint,
    protocol: IpNextHeaderProtocol,
}

impl EndpointPair {
    pub fn new(a: Endpoint, b: Endpoint, protocol: IpNextHeaderProtocol) -> Self {
        // Ports mean nothing for ICMP and friends.
        let (a, b) = if has_ports(protocol) {
            (a, b)
        } else {
            (Endpoint::new(a.ip, 0), Endpoint::new(b.ip, 0))
        };
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        Self {
            low,
            high,
            protocol,
        }
    }

    /// Derive the identity of the (inner) flow of a descriptor.
    pub fn resolve(flow: &FlowDescriptor) -> Result<Self, EndpointError> {
        if flow.src_ip.is_ipv4() != flow.dest_ip.is_ipv4() {
            return Err(EndpointError::MixedFamilies {
                src: flow.src_ip.to_string(),
                dst: flow.dest_ip.to_string(),
            });
        }
        let protocol = parse_ip_protocol(&flow.proto)
            .ok_or_else(|| EndpointError::UnsupportedProtocol(flow.proto.clone()))?;

        Ok(Self::new(
            Endpoint::new(flow.src_ip, flow.src_port),
            Endpoint::new(flow.dest_ip, flow.dest_port),
            protocol,
        ))
    }

    /// Whether a packet going from `src` to `dst` belongs to this flow.
    pub fn matches(&self, src: Endpoint, dst: Endpoint, protocol: IpNextHeaderProtocol) -> bool {
        protocol == self.protocol && Self::new(src, dst, protocol) == *self
    }
}

impl fmt::Display for EndpointPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <-{}-> {}", self.low, self.protocol.0, self.high)
    }
}
