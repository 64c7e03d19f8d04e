//! pnet-based frame parser.

use std::net::IpAddr;

use pnet::packet::ethernet::{EtherType, EtherTypes, EthernetPacket};
use pnet::packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::ipv6::Ipv6Packet;
use pnet::packet::tcp::TcpPacket;
use pnet::packet::udp::UdpPacket;
use pnet::packet::vlan::VlanPacket;

use super::tunnel::decapsulate_once;
use super::{FlowFields, IpLayer, LinkType};
use crate::domain::Endpoint;

/// Linux cooked capture header length
const SLL_HEADER_LEN: usize = 16;

/// More IPv6 extension headers than this is not a real packet.
const MAX_IPV6_EXTENSIONS: usize = 8;

/// Parses captured frames of one link type.
#[derive(Debug, Clone, Copy)]
pub struct FrameParser {
    link: LinkType,
}

impl FrameParser {
    pub fn new(link: LinkType) -> Self {
        Self { link }
    }

    pub fn link_type(&self) -> LinkType {
        self.link
    }

    /// The outermost IP header of a frame.
    pub fn outer_ip<'a>(&self, frame: &'a [u8]) -> Option<IpLayer<'a>> {
        match self.link {
            LinkType::Ethernet => ethernet_to_ip(frame),
            LinkType::RawIp => raw_ip(frame),
            LinkType::LinuxSll => {
                if frame.len() < SLL_HEADER_LEN {
                    return None;
                }
                let ethertype = EtherType(u16::from_be_bytes([frame[14], frame[15]]));
                ip_for_ethertype(ethertype, &frame[SLL_HEADER_LEN..])
            }
        }
    }

    /// The IP header found after stripping `depth` encapsulating layers.
    ///
    /// Returns `None` if the frame does not carry that many recognised
    /// tunnel layers.
    pub fn decapsulate<'a>(&self, frame: &'a [u8], depth: u8) -> Option<IpLayer<'a>> {
        let mut layer = self.outer_ip(frame)?;
        for _ in 0..depth {
            layer = decapsulate_once(&layer)?;
        }
        Some(layer)
    }

    /// Flow-identifying fields after stripping `depth` layers.
    pub fn flow_fields(&self, frame: &[u8], depth: u8) -> Option<FlowFields> {
        let layer = self.decapsulate(frame, depth)?;
        let (src_port, dst_port) = transport_ports(&layer)?;
        Some(FlowFields {
            src: Endpoint::new(layer.src, src_port),
            dst: Endpoint::new(layer.dst, dst_port),
            protocol: layer.protocol,
        })
    }
}

/// Source and destination ports of the transport header.
///
/// Protocols without ports yield `(0, 0)`. A port-bearing header that is
/// missing or truncated yields `None`.
pub(super) fn transport_ports(layer: &IpLayer<'_>) -> Option<(u16, u16)> {
    match layer.protocol {
        IpNextHeaderProtocols::Tcp => {
            let tcp = TcpPacket::new(layer.payload)?;
            Some((tcp.get_source(), tcp.get_destination()))
        }
        IpNextHeaderProtocols::Udp => {
            let udp = UdpPacket::new(layer.payload)?;
            Some((udp.get_source(), udp.get_destination()))
        }
        IpNextHeaderProtocols::Sctp => {
            let p = layer.payload;
            if p.len() < 4 {
                return None;
            }
            Some((
                u16::from_be_bytes([p[0], p[1]]),
                u16::from_be_bytes([p[2], p[3]]),
            ))
        }
        _ => Some((0, 0)),
    }
}

/// Walk an Ethernet frame, including any VLAN tags, down to its IP header.
pub(super) fn ethernet_to_ip(frame: &[u8]) -> Option<IpLayer<'_>> {
    let ethernet = EthernetPacket::new(frame)?;
    let mut ethertype = ethernet.get_ethertype();
    let mut offset = EthernetPacket::minimum_packet_size();

    while matches!(
        ethertype,
        EtherTypes::Vlan | EtherTypes::PBridge | EtherTypes::QinQ
    ) {
        let vlan = VlanPacket::new(frame.get(offset..)?)?;
        ethertype = vlan.get_ethertype();
        offset += VlanPacket::minimum_packet_size();
    }

    ip_for_ethertype(ethertype, frame.get(offset..)?)
}

pub(super) fn ip_for_ethertype(ethertype: EtherType, data: &[u8]) -> Option<IpLayer<'_>> {
    match ethertype {
        EtherTypes::Ipv4 => ipv4(data),
        EtherTypes::Ipv6 => ipv6(data),
        _ => None,
    }
}

/// IP header with the version taken from the first nibble.
pub(super) fn raw_ip(data: &[u8]) -> Option<IpLayer<'_>> {
    match data.first()? >> 4 {
        4 => ipv4(data),
        6 => ipv6(data),
        _ => None,
    }
}

pub(super) fn ipv4(data: &[u8]) -> Option<IpLayer<'_>> {
    let packet = Ipv4Packet::new(data)?;
    if packet.get_version() != 4 {
        return None;
    }
    let header_len = packet.get_header_length() as usize * 4;
    if header_len < Ipv4Packet::minimum_packet_size() || header_len > data.len() {
        return None;
    }
    let total_len = (packet.get_total_length() as usize).clamp(header_len, data.len());

    // Non-first fragments carry no transport header.
    let protocol = if packet.get_fragment_offset() != 0 {
        IpNextHeaderProtocols::Reserved
    } else {
        packet.get_next_level_protocol()
    };

    Some(IpLayer {
        src: IpAddr::V4(packet.get_source()),
        dst: IpAddr::V4(packet.get_destination()),
        protocol,
        payload: &data[header_len..total_len],
    })
}

pub(super) fn ipv6(data: &[u8]) -> Option<IpLayer<'_>> {
    let packet = Ipv6Packet::new(data)?;
    if packet.get_version() != 6 {
        return None;
    }
    let header_len = Ipv6Packet::minimum_packet_size();
    let end = (header_len + packet.get_payload_length() as usize).min(data.len());
    let (protocol, payload) = skip_ipv6_extensions(packet.get_next_header(), &data[header_len..end])?;

    Some(IpLayer {
        src: IpAddr::V6(packet.get_source()),
        dst: IpAddr::V6(packet.get_destination()),
        protocol,
        payload,
    })
}

fn skip_ipv6_extensions(
    mut next: IpNextHeaderProtocol,
    mut data: &[u8],
) -> Option<(IpNextHeaderProtocol, &[u8])> {
    for _ in 0..MAX_IPV6_EXTENSIONS {
        let len = match next {
            IpNextHeaderProtocols::Hopopt
            | IpNextHeaderProtocols::Ipv6Route
            | IpNextHeaderProtocols::Ipv6Opts => (*data.get(1)? as usize + 1) * 8,
            IpNextHeaderProtocols::Ipv6Frag => {
                // Only the first fragment has the transport header.
                let offset = u16::from_be_bytes([*data.get(2)?, *data.get(3)?]) >> 3;
                if offset != 0 {
                    return Some((IpNextHeaderProtocols::Reserved, &data[..0]));
                }
                8
            }
            _ => return Some((next, data)),
        };
        next = IpNextHeaderProtocol(*data.first()?);
        data = data.get(len..)?;
    }
    None
}
