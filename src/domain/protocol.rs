//! Transport protocol names as they appear in EVE events.

use pnet::packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};

/// Parse a protocol name (`TCP`, `UDP`, `IPv6-ICMP`, ...) or a decimal
/// protocol number.
pub fn parse_ip_protocol(name: &str) -> Option<IpNextHeaderProtocol> {
    let name = name.trim().to_ascii_lowercase();
    let protocol = match name.as_str() {
        "tcp" => IpNextHeaderProtocols::Tcp,
        "udp" => IpNextHeaderProtocols::Udp,
        "sctp" => IpNextHeaderProtocols::Sctp,
        "icmp" => IpNextHeaderProtocols::Icmp,
        "ipv6-icmp" | "icmpv6" | "icmp6" => IpNextHeaderProtocols::Icmpv6,
        "gre" => IpNextHeaderProtocols::Gre,
        _ => IpNextHeaderProtocol(name.parse::<u8>().ok()?),
    };
    Some(protocol)
}

/// Whether the protocol carries source/destination ports.
pub fn has_ports(protocol: IpNextHeaderProtocol) -> bool {
    protocol == IpNextHeaderProtocols::Tcp
        || protocol == IpNextHeaderProtocols::Udp
        || protocol == IpNextHeaderProtocols::Sctp
}
