//! Per-packet flow membership test.

use crate::domain::{EndpointPair, FlowDescriptor};
use crate::parser::FrameParser;

/// Matches packets against a flow's endpoint identity after stripping the
/// flow's tunnel layers.
///
/// Pure: holds no state that changes between packets.
#[derive(Debug, Clone)]
pub struct TunnelMatcher {
    endpoints: EndpointPair,
    depth: u8,
    parser: FrameParser,
}

impl TunnelMatcher {
    pub fn new(endpoints: EndpointPair, flow: &FlowDescriptor, parser: FrameParser) -> Self {
        Self {
            endpoints,
            depth: flow.tunnel_depth(),
            parser,
        }
    }

    /// Parse frames of a different link type from now on.
    pub fn set_parser(&mut self, parser: FrameParser) {
        self.parser = parser;
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Does this frame belong to the flow?
    pub fn matches(&self, frame: &[u8]) -> bool {
        self.parser
            .flow_fields(frame, self.depth)
            .map(|fields| self.endpoints.matches(fields.src, fields.dst, fields.protocol))
            .unwrap_or(false)
    }
}
