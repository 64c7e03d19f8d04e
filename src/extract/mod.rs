//! Flow extraction: wires the collaborators together and runs the engine.

mod engine;

pub use engine::{
    AcceptancePolicy, ExtractSummary, ExtractionEngine, StopReason, MAX_CONSECUTIVE_READ_ERRORS,
};

use std::net::IpAddr;

use tracing::{debug, info, warn};

use crate::capture::{CaptureWriter, PcapFileSource};
use crate::config::ExtractConfig;
use crate::cursor::{FileFormat, RotationCursor};
use crate::detector::TunnelMatcher;
use crate::domain::{EndpointPair, FlowDescriptor};
use crate::error::ExtractError;
use crate::filter::build_filter;
use crate::parser::{FrameParser, LinkType};

/// Extract the packets of the flow described by `config.event_path` into
/// `config.output`.
///
/// Fails before touching any capture file if the event can't be loaded, its
/// starting file is missing or its endpoints don't resolve. A filter that
/// can't be built only costs speed: every packet is then matched in-process.
pub fn extract_pcap_file(config: &ExtractConfig) -> Result<ExtractSummary, ExtractError> {
    let flow = FlowDescriptor::load(&config.event_path)?;

    let start_file = flow.verify_starting_file(&config.pcap_log_dir)?;
    if let Some(path) = &start_file {
        debug!("Starting from file {}", path.display());
    }

    if let Some(tunnel) = flow.tunnel.as_ref().filter(|t| t.depth > 0) {
        debug!(
            "Tunnel: {} <-{}-> {}",
            display_addr(tunnel.src_ip),
            tunnel.proto,
            display_addr(tunnel.dest_ip)
        );
    }
    debug!(
        "Flow: {} <-{}:{}-> {}",
        flow.src_ip, flow.proto, flow.app_proto, flow.dest_ip
    );
    let endpoints = EndpointPair::resolve(&flow)?;

    let format = FileFormat::parse(&config.file_format)?;
    let cursor = RotationCursor::new(&config.pcap_log_dir, start_file.as_deref(), &format)?;

    let filter = if config.skip_bpf {
        None
    } else {
        match build_filter(&flow) {
            Ok(filter) => {
                debug!("BPF filter: {}", filter);
                Some(filter)
            }
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    };

    let writer = CaptureWriter::create(&config.output)?;

    let matcher = TunnelMatcher::new(endpoints, &flow, FrameParser::new(LinkType::Ethernet));
    let policy = AcceptancePolicy::for_session(filter.as_ref(), matcher);

    let source = PcapFileSource;
    let (summary, _) = ExtractionEngine::new(cursor, &source, policy, writer)
        .with_filter(filter)
        .with_flow_timeout(config.flow_timeout)
        .anchored(start_file.is_some())
        .run()?;

    info!("Finished in {:?}", summary.elapsed);
    info!("Written {} packet(s)", summary.packets);
    Ok(summary)
}

fn display_addr(addr: Option<IpAddr>) -> String {
    addr.map_or_else(|| "?".to_string(), |ip| ip.to_string())
}
