//! Builds the read-layer filter for a flow.

use pnet::packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};

use super::{CaptureFilter, Primitive};
use crate::domain::{has_ports, parse_ip_protocol, FlowDescriptor, Tunnel};
use crate::error::FilterError;

/// Build the capture filter for a flow.
///
/// Without a tunnel the filter selects the flow itself. With a tunnel it can
/// only select the outer carrier, and the tunnel matcher does the rest.
pub fn build_filter(flow: &FlowDescriptor) -> Result<CaptureFilter, FilterError> {
    match &flow.tunnel {
        Some(tunnel) if tunnel.depth > 0 => carrier_filter(tunnel),
        _ => flow_filter(flow),
    }
}

fn flow_filter(flow: &FlowDescriptor) -> Result<CaptureFilter, FilterError> {
    let protocol = parse_ip_protocol(&flow.proto)
        .ok_or_else(|| FilterError::UnsupportedProtocol(flow.proto.clone()))?;

    let mut primitives = vec![
        Primitive::Protocol(protocol),
        Primitive::Host(flow.src_ip),
        Primitive::Host(flow.dest_ip),
    ];
    if has_ports(protocol) && flow.src_port != 0 && flow.dest_port != 0 {
        primitives.push(Primitive::Port(flow.src_port));
        primitives.push(Primitive::Port(flow.dest_port));
    }
    Ok(CaptureFilter::new(primitives))
}

fn carrier_filter(tunnel: &Tunnel) -> Result<CaptureFilter, FilterError> {
    let (Some(src), Some(dst)) = (tunnel.src_ip, tunnel.dest_ip) else {
        return Err(FilterError::MissingTunnelEndpoint(tunnel.depth));
    };

    let mut primitives = Vec::with_capacity(3);
    if let Some(protocol) = carrier_protocol(&tunnel.proto) {
        primitives.push(Primitive::Protocol(protocol));
    }
    primitives.push(Primitive::Host(src));
    primitives.push(Primitive::Host(dst));
    Ok(CaptureFilter::new(primitives))
}

/// IP protocol of the outer carrier named in a tunnel record.
///
/// Unknown names give no protocol primitive rather than an error: the host
/// pair alone still narrows the read.
fn carrier_protocol(name: &str) -> Option<IpNextHeaderProtocol> {
    match name.trim().to_ascii_lowercase().as_str() {
        "" => None,
        "gre" | "erspan" => Some(IpNextHeaderProtocols::Gre),
        "vxlan" | "geneve" | "gtp" | "gtp-u" | "teredo" | "udp" => Some(IpNextHeaderProtocols::Udp),
        "ipv4" | "ipip" | "ip-in-ip" => Some(IpNextHeaderProtocols::Ipv4),
        "ipv6" | "ip6" => Some(IpNextHeaderProtocols::Ipv6),
        other => parse_ip_protocol(other),
    }
}
