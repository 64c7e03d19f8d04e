//! Domain models for flow extraction.
//!
//! These types describe the flow being extracted and the packets moving
//! through the engine, independent of any capture file format.

mod endpoint;
mod flow;
mod packet;
mod protocol;

pub use endpoint::{Endpoint, EndpointPair};
pub use flow::{FlowDescriptor, Tunnel};
pub use packet::CapturedPacket;
pub use protocol::{has_ports, parse_ip_protocol};
