//! Tunnel decapsulation, one layer at a time.
//!
//! Covered: IP-in-IP, GRE (including transparent Ethernet bridging and
//! ERSPAN type II), VXLAN, Geneve, GTP-U and Teredo.

use pnet::packet::ethernet::{EtherType, EtherTypes};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::udp::UdpPacket;

use super::frame_parser::{ethernet_to_ip, ip_for_ethertype, ipv4, ipv6, raw_ip};
use super::IpLayer;

pub const VXLAN_PORT: u16 = 4789;
pub const GENEVE_PORT: u16 = 6081;
pub const GTP_U_PORT: u16 = 2152;
pub const TEREDO_PORT: u16 = 3544;

/// Transparent Ethernet bridging
const ETHERTYPE_TEB: u16 = 0x6558;
const ETHERTYPE_ERSPAN_II: u16 = 0x88be;

const GRE_CHECKSUM_PRESENT: u16 = 0x8000;
const GRE_KEY_PRESENT: u16 = 0x2000;
const GRE_SEQUENCE_PRESENT: u16 = 0x1000;
const GRE_VERSION_MASK: u16 = 0x0007;

const GTP_G_PDU: u8 = 0xff;
const GTP_FLAG_EXTENSION: u8 = 0x04;
const GTP_FLAGS_OPTIONAL: u8 = 0x07;
const GTP_MAX_EXTENSIONS: usize = 16;

/// Strip one encapsulation layer, returning the carried IP header.
pub(super) fn decapsulate_once<'a>(layer: &IpLayer<'a>) -> Option<IpLayer<'a>> {
    match layer.protocol {
        IpNextHeaderProtocols::Ipv4 => ipv4(layer.payload),
        IpNextHeaderProtocols::Ipv6 => ipv6(layer.payload),
        IpNextHeaderProtocols::Gre => gre(layer.payload),
        IpNextHeaderProtocols::Udp => udp_tunnel(layer.payload),
        _ => None,
    }
}

fn gre(data: &[u8]) -> Option<IpLayer<'_>> {
    if data.len() < 4 {
        return None;
    }
    let flags = u16::from_be_bytes([data[0], data[1]]);
    // Version 1 is PPTP, which carries PPP rather than IP.
    if flags & GRE_VERSION_MASK != 0 {
        return None;
    }
    let protocol_type = u16::from_be_bytes([data[2], data[3]]);

    let mut offset = 4;
    for flag in [GRE_CHECKSUM_PRESENT, GRE_KEY_PRESENT, GRE_SEQUENCE_PRESENT] {
        if flags & flag != 0 {
            offset += 4;
        }
    }
    let payload = data.get(offset..)?;

    match protocol_type {
        ETHERTYPE_TEB => ethernet_to_ip(payload),
        ETHERTYPE_ERSPAN_II => ethernet_to_ip(payload.get(8..)?),
        other => ip_for_ethertype(EtherType(other), payload),
    }
}

fn udp_tunnel(data: &[u8]) -> Option<IpLayer<'_>> {
    let udp = UdpPacket::new(data)?;
    let payload = data.get(UdpPacket::minimum_packet_size()..)?;
    let ports = [udp.get_destination(), udp.get_source()];

    if ports.contains(&VXLAN_PORT) {
        return ethernet_to_ip(payload.get(8..)?);
    }
    if ports.contains(&GENEVE_PORT) {
        return geneve(payload);
    }
    if ports.contains(&GTP_U_PORT) {
        return gtp_u(payload);
    }
    if ports.contains(&TEREDO_PORT) {
        return teredo(payload);
    }
    None
}

fn geneve(data: &[u8]) -> Option<IpLayer<'_>> {
    if data.len() < 8 {
        return None;
    }
    let options_len = (data[0] & 0x3f) as usize * 4;
    let protocol_type = u16::from_be_bytes([data[2], data[3]]);
    let payload = data.get(8 + options_len..)?;
    match protocol_type {
        ETHERTYPE_TEB => ethernet_to_ip(payload),
        other => ip_for_ethertype(EtherType(other), payload),
    }
}

fn gtp_u(data: &[u8]) -> Option<IpLayer<'_>> {
    if data.len() < 8 || data[0] >> 5 != 1 || data[1] != GTP_G_PDU {
        return None;
    }
    let flags = data[0];
    let mut offset = 8;
    if flags & GTP_FLAGS_OPTIONAL != 0 {
        offset += 4;
        if flags & GTP_FLAG_EXTENSION != 0 {
            // The last optional byte names the first extension header.
            let mut next = *data.get(offset - 1)?;
            let mut count = 0;
            while next != 0 {
                count += 1;
                if count > GTP_MAX_EXTENSIONS {
                    return None;
                }
                let len = *data.get(offset)? as usize * 4;
                if len == 0 {
                    return None;
                }
                next = *data.get(offset + len - 1)?;
                offset += len;
            }
        }
    }
    raw_ip(data.get(offset..)?)
}

fn teredo(data: &[u8]) -> Option<IpLayer<'_>> {
    let mut offset = 0;
    // Authentication indicator
    if data.get(..2)? == [0x00, 0x01] {
        let id_len = *data.get(2)? as usize;
        let auth_len = *data.get(3)? as usize;
        offset += 4 + id_len + auth_len + 8 + 1;
    }
    // Origin indicator
    if data.get(offset..offset + 2)? == [0x00, 0x00] {
        offset += 8;
    }
    let payload = data.get(offset..)?;
    if payload.first()? >> 4 != 6 {
        return None;
    }
    ip_for_ethertype(EtherTypes::Ipv6, payload)
}
