//! Tunnel matching module.
//!
//! Decides whether a raw packet, once decapsulated, belongs to the flow
//! being extracted.

mod tunnel_matcher;

pub use tunnel_matcher::TunnelMatcher;
