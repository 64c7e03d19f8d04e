//! The extraction engine.
//!
//! Walks the rotation one file at a time as an explicit state machine:
//!
//! ```text
//! Init -> Scanning <-> Advancing -> Done
//! ```
//!
//! `Scanning` streams one file through the acceptance policy. `Advancing`
//! asks the cursor for the next file, peeks its first record and decides
//! whether the flow can still be alive in it.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::capture::{CaptureSource, CaptureWriter, PacketReader, PeekableReader};
use crate::config::DEFAULT_FLOW_TIMEOUT;
use crate::cursor::{CursorStep, FileCursor};
use crate::detector::TunnelMatcher;
use crate::error::ExtractError;
use crate::filter::CaptureFilter;
use crate::parser::FrameParser;

/// Unreadable records in a row before the rest of a file is given up on.
pub const MAX_CONSECUTIVE_READ_ERRORS: u32 = 16;

/// How packets surviving the read-layer filter are accepted.
///
/// Chosen once per session so the per-packet loop never re-decides it.
#[derive(Debug, Clone)]
pub enum AcceptancePolicy {
    /// The read-layer filter selects exactly the flow.
    TrustFilter,
    /// Every packet goes through the tunnel matcher.
    MatchTunnel(TunnelMatcher),
}

impl AcceptancePolicy {
    /// The filter can only be trusted when there is one and the flow is not
    /// tunnelled: a filter never sees inside a tunnel.
    pub fn for_session(filter: Option<&CaptureFilter>, matcher: TunnelMatcher) -> Self {
        match filter {
            Some(_) if matcher.depth() == 0 => AcceptancePolicy::TrustFilter,
            _ => AcceptancePolicy::MatchTunnel(matcher),
        }
    }

    fn accepts(&self, frame: &[u8]) -> bool {
        match self {
            AcceptancePolicy::TrustFilter => true,
            AcceptancePolicy::MatchTunnel(matcher) => matcher.matches(frame),
        }
    }

    fn use_reader(&mut self, reader: &dyn PacketReader) {
        if let AcceptancePolicy::MatchTunnel(matcher) = self {
            matcher.set_parser(FrameParser::new(reader.link_type()));
        }
    }
}

/// Why the walk over the rotation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The cursor had no file at all.
    NoFiles,
    /// Every file of the rotation was scanned.
    Exhausted,
    /// The next file starts after the flow went idle.
    FlowIdle,
    /// A file could not be opened.
    OpenFailed,
    /// The cursor failed after the first file.
    CursorFailed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::NoFiles => "no capture file",
            StopReason::Exhausted => "end of rotation",
            StopReason::FlowIdle => "flow timeout",
            StopReason::OpenFailed => "capture file could not be opened",
            StopReason::CursorFailed => "rotation listing failed",
        };
        f.write_str(text)
    }
}

/// Result of a finished extraction.
#[derive(Debug, Clone)]
pub struct ExtractSummary {
    pub packets: u64,
    pub files_scanned: usize,
    pub stop_reason: StopReason,
    pub elapsed: Duration,
}

impl fmt::Display for ExtractSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} packet(s) from {} file(s) in {:.3?} ({})",
            self.packets, self.files_scanned, self.elapsed, self.stop_reason
        )
    }
}

/// Mutable state of one extraction, owned by the engine.
#[derive(Debug, Default)]
struct SessionState {
    files_scanned: usize,
    /// First record of the starting file, before filtering.
    start_timestamp: Option<Duration>,
    /// First record of the most recently probed file, before filtering.
    probed_timestamp: Option<Duration>,
    /// Timestamp of the last packet written to the output.
    last_accepted: Option<Duration>,
}

impl SessionState {
    /// Point the flow-idle gate is measured from.
    fn anchor(&self) -> Option<Duration> {
        self.last_accepted.or(self.start_timestamp)
    }
}

enum EngineState {
    Init,
    Scanning { path: PathBuf, reader: PeekableReader },
    Advancing,
    Done(StopReason),
}

/// Drives one extraction from the cursor's first file to a stop.
pub struct ExtractionEngine<'a, C, W: Write> {
    cursor: C,
    source: &'a dyn CaptureSource,
    filter: Option<CaptureFilter>,
    policy: AcceptancePolicy,
    flow_timeout: Duration,
    anchored: bool,
    writer: CaptureWriter<W>,
    session: SessionState,
}

impl<'a, C: FileCursor, W: Write> ExtractionEngine<'a, C, W> {
    pub fn new(
        cursor: C,
        source: &'a dyn CaptureSource,
        policy: AcceptancePolicy,
        writer: CaptureWriter<W>,
    ) -> Self {
        Self {
            cursor,
            source,
            filter: None,
            policy,
            flow_timeout: DEFAULT_FLOW_TIMEOUT,
            anchored: false,
            writer,
            session: SessionState::default(),
        }
    }

    /// Read-layer filter applied to every file opened.
    pub fn with_filter(mut self, filter: Option<CaptureFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_flow_timeout(mut self, flow_timeout: Duration) -> Self {
        self.flow_timeout = flow_timeout;
        self
    }

    /// Whether the cursor starts at the file the flow was first seen in.
    ///
    /// Only then does the flow-idle gate apply. Without it the whole rotation
    /// is walked until the cursor is exhausted.
    pub fn anchored(mut self, anchored: bool) -> Self {
        self.anchored = anchored;
        self
    }

    /// Run to completion and hand back the summary and the output writer.
    pub fn run(mut self) -> Result<(ExtractSummary, W), ExtractError> {
        let start = Instant::now();
        let mut state = EngineState::Init;

        let stop_reason = loop {
            state = match state {
                EngineState::Init => self.init()?,
                EngineState::Scanning { path, reader } => self.scan(&path, reader)?,
                EngineState::Advancing => self.advance(),
                EngineState::Done(reason) => break reason,
            };
        };

        let packets = self.writer.records();
        let output = self.writer.finish()?;
        let summary = ExtractSummary {
            packets,
            files_scanned: self.session.files_scanned,
            stop_reason,
            elapsed: start.elapsed(),
        };
        Ok((summary, output))
    }

    fn init(&mut self) -> Result<EngineState, ExtractError> {
        let path = match self.cursor.next_file()? {
            CursorStep::File(path) => path,
            CursorStep::Exhausted => {
                debug!("Expected at least one capture file");
                return Ok(EngineState::Done(StopReason::NoFiles));
            }
        };

        let Some(mut reader) = self.open(&path) else {
            return Ok(EngineState::Done(StopReason::OpenFailed));
        };
        self.session.start_timestamp = self.peek_first(&path, &mut reader);
        Ok(EngineState::Scanning { path, reader })
    }

    fn scan(&mut self, path: &Path, mut reader: PeekableReader) -> Result<EngineState, ExtractError> {
        debug!("Reading packets from {}", path.display());
        let mut file_packets = 0u64;
        let mut read_errors = 0u32;

        loop {
            let packet = match reader.read_next() {
                Ok(Some(packet)) => packet,
                Ok(None) => break,
                Err(e) => {
                    warn!(
                        "Failed to read packet after {} from {}: {}",
                        file_packets,
                        path.display(),
                        e
                    );
                    read_errors += 1;
                    if read_errors >= MAX_CONSECUTIVE_READ_ERRORS {
                        warn!("Giving up on the rest of {}", path.display());
                        break;
                    }
                    continue;
                }
            };
            read_errors = 0;

            if self.policy.accepts(&packet.data) {
                self.writer.write_record(&packet)?;
                self.session.last_accepted = Some(packet.timestamp);
                file_packets += 1;
            }
        }

        self.session.files_scanned += 1;
        debug!("Extracted {} packet(s) from pcap file {}", file_packets, path.display());
        Ok(EngineState::Advancing)
    }

    fn advance(&mut self) -> EngineState {
        let path = match self.cursor.next_file() {
            Ok(CursorStep::File(path)) => path,
            Ok(CursorStep::Exhausted) => return EngineState::Done(StopReason::Exhausted),
            Err(e) => {
                warn!("Can't get next capture file: {}", e);
                return EngineState::Done(StopReason::CursorFailed);
            }
        };

        let Some(mut reader) = self.open(&path) else {
            return EngineState::Done(StopReason::OpenFailed);
        };
        self.session.probed_timestamp = self.peek_first(&path, &mut reader);

        if self.anchored && self.flow_is_idle() {
            debug!(
                "{} starts more than {:?} after the flow's last packet, stopping",
                path.display(),
                self.flow_timeout
            );
            return EngineState::Done(StopReason::FlowIdle);
        }
        EngineState::Scanning { path, reader }
    }

    /// The probed file starts at or after `anchor + flow_timeout`.
    ///
    /// Without both timestamps there is nothing to gate on and the walk
    /// continues.
    fn flow_is_idle(&self) -> bool {
        match (self.session.anchor(), self.session.probed_timestamp) {
            (Some(anchor), Some(first)) => first >= anchor + self.flow_timeout,
            _ => false,
        }
    }

    fn open(&mut self, path: &Path) -> Option<PeekableReader> {
        match self.source.open(path, self.filter.as_ref()) {
            Ok(reader) => {
                self.policy.use_reader(reader.as_ref());
                Some(PeekableReader::new(reader))
            }
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    fn peek_first(&self, path: &Path, reader: &mut PeekableReader) -> Option<Duration> {
        match reader.peek_timestamp() {
            Ok(first) => {
                if let Some(ts) = first {
                    debug!("{} starts at {}", path.display(), rfc3339(ts));
                }
                first
            }
            Err(e) => {
                warn!("Can't read first packet of {}: {}", path.display(), e);
                None
            }
        }
    }
}

fn rfc3339(ts: Duration) -> String {
    i64::try_from(ts.as_secs())
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, ts.subsec_nanos()))
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| format!("{:?}", ts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CapturedPacket, EndpointPair, FlowDescriptor};
    use crate::error::{CaptureError, CursorError};
    use crate::filter::build_filter;
    use crate::parser::test_frames::*;
    use crate::parser::LinkType;
    use std::cell::RefCell;
    use std::collections::{HashMap, VecDeque};

    const PLAIN: &str = r#"{"capture_file": "f1", "src_ip": "10.0.0.1", "dest_ip": "10.0.0.2",
        "src_port": 1000, "dest_port": 80, "proto": "TCP"}"#;

    const GRE_TUNNEL: &str = r#"{"capture_file": "f1", "src_ip": "10.0.0.1", "dest_ip": "10.0.0.2",
        "src_port": 1000, "dest_port": 80, "proto": "TCP",
        "tunnel": {"src_ip": "172.16.0.1", "dest_ip": "172.16.0.2", "proto": "GRE", "depth": 1}}"#;

    /// A record in an in-memory capture file.
    enum Record {
        Packet(CapturedPacket),
        Malformed,
    }

    fn at(secs: u64, frame: Vec<u8>) -> Record {
        Record::Packet(CapturedPacket::new(Duration::from_secs(secs), frame.len() as u32, frame))
    }

    fn flow_packet(secs: u64) -> Record {
        at(secs, tcp_frame(1, 1000, 2, 80))
    }

    fn other_packet(secs: u64) -> Record {
        at(secs, tcp_frame(7, 5555, 8, 443))
    }

    struct MemoryReader {
        records: VecDeque<Record>,
        filter: Option<CaptureFilter>,
    }

    impl PacketReader for MemoryReader {
        fn read_record(&mut self) -> Result<Option<CapturedPacket>, CaptureError> {
            match self.records.pop_front() {
                Some(Record::Packet(p)) => Ok(Some(p)),
                Some(Record::Malformed) => Err(CaptureError::Read("bad record".to_string())),
                None => Ok(None),
            }
        }

        fn admits(&self, packet: &CapturedPacket) -> bool {
            let parser = FrameParser::new(LinkType::Ethernet);
            self.filter
                .as_ref()
                .map_or(true, |filter| filter.matches(&parser, &packet.data))
        }

        fn link_type(&self) -> LinkType {
            LinkType::Ethernet
        }
    }

    /// In-memory rotation. Records every open and applies the filter it is
    /// given.
    #[derive(Default)]
    struct MemorySource {
        files: RefCell<HashMap<PathBuf, Vec<Record>>>,
        opened: RefCell<Vec<PathBuf>>,
    }

    impl MemorySource {
        fn with(files: Vec<(&str, Vec<Record>)>) -> Self {
            let source = MemorySource::default();
            for (name, records) in files {
                source.files.borrow_mut().insert(PathBuf::from(name), records);
            }
            source
        }

        fn opened(&self) -> Vec<String> {
            self.opened
                .borrow()
                .iter()
                .map(|p| p.display().to_string())
                .collect()
        }
    }

    impl CaptureSource for MemorySource {
        fn open(
            &self,
            path: &Path,
            filter: Option<&CaptureFilter>,
        ) -> Result<Box<dyn PacketReader>, CaptureError> {
            self.opened.borrow_mut().push(path.to_path_buf());
            match self.files.borrow_mut().remove(path) {
                Some(records) => Ok(Box::new(MemoryReader {
                    records: records.into(),
                    filter: filter.cloned(),
                })),
                None => Err(CaptureError::Open {
                    path: path.to_path_buf(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                }),
            }
        }
    }

    struct ListCursor {
        steps: VecDeque<Result<CursorStep, CursorError>>,
    }

    impl ListCursor {
        fn new(names: &[&str]) -> Self {
            Self {
                steps: names
                    .iter()
                    .map(|n| Ok(CursorStep::File(PathBuf::from(n))))
                    .collect(),
            }
        }

        fn then_fail(mut self) -> Self {
            self.steps.push_back(Err(CursorError::InvalidFormat("%x".to_string())));
            self
        }
    }

    impl FileCursor for ListCursor {
        fn next_file(&mut self) -> Result<CursorStep, CursorError> {
            self.steps.pop_front().unwrap_or(Ok(CursorStep::Exhausted))
        }
    }

    fn matcher(json: &str) -> TunnelMatcher {
        let flow = FlowDescriptor::from_json(json, Path::new("event.json")).unwrap();
        let endpoints = EndpointPair::resolve(&flow).unwrap();
        TunnelMatcher::new(endpoints, &flow, FrameParser::new(LinkType::Ethernet))
    }

    fn engine<'a>(
        cursor: ListCursor,
        source: &'a MemorySource,
        policy: AcceptancePolicy,
    ) -> ExtractionEngine<'a, ListCursor, Vec<u8>> {
        let writer = CaptureWriter::new(Vec::new()).unwrap();
        ExtractionEngine::new(cursor, source, policy, writer)
            .with_flow_timeout(Duration::from_secs(600))
            .anchored(true)
    }

    fn written(output: &[u8]) -> Vec<CapturedPacket> {
        let mut reader = pcap_file::pcap::PcapReader::new(output).unwrap();
        let mut out = Vec::new();
        while let Some(packet) = reader.next_packet() {
            let packet = packet.unwrap();
            out.push(CapturedPacket::new(
                packet.timestamp,
                packet.orig_len,
                packet.data.into_owned(),
            ));
        }
        out
    }

    mod policy_tests {
        use super::*;

        #[test]
        fn trusts_filter_without_tunnel() {
            let filter = CaptureFilter::new(Vec::new());
            let policy = AcceptancePolicy::for_session(Some(&filter), matcher(PLAIN));
            assert!(matches!(policy, AcceptancePolicy::TrustFilter));
        }

        #[test]
        fn matches_without_filter() {
            let policy = AcceptancePolicy::for_session(None, matcher(PLAIN));
            assert!(matches!(policy, AcceptancePolicy::MatchTunnel(_)));
        }

        #[test]
        fn matches_inside_tunnel_even_with_filter() {
            let filter = CaptureFilter::new(Vec::new());
            let policy = AcceptancePolicy::for_session(Some(&filter), matcher(GRE_TUNNEL));
            assert!(matches!(policy, AcceptancePolicy::MatchTunnel(_)));
        }
    }

    #[test]
    fn trusted_filter_copies_every_packet_verbatim() {
        let source = MemorySource::with(vec![(
            "f1",
            vec![flow_packet(100), other_packet(101), flow_packet(102)],
        )]);
        let (summary, output) = engine(ListCursor::new(&["f1"]), &source, AcceptancePolicy::TrustFilter)
            .run()
            .unwrap();

        assert_eq!(summary.packets, 3);
        assert_eq!(summary.stop_reason, StopReason::Exhausted);
        let packets = written(&output);
        assert_eq!(packets.len(), 3);
        assert_eq!(packets[1].data, tcp_frame(7, 5555, 8, 443));
        assert_eq!(packets[2].timestamp, Duration::from_secs(102));
    }

    #[test]
    fn tunnel_flow_keeps_only_matching_inner_packets() {
        let inner = ipv4(v4(1), v4(2), PROTO_TCP, &tcp(1000, 80));
        let reply = ipv4(v4(2), v4(1), PROTO_TCP, &tcp(80, 1000));
        let other = ipv4(v4(1), v4(9), PROTO_TCP, &tcp(1000, 80));
        let source = MemorySource::with(vec![(
            "f1",
            vec![
                at(100, gre_frame(&inner)),
                at(101, gre_frame(&other)),
                at(102, tcp_frame(1, 1000, 2, 80)),
                at(103, gre_frame(&reply)),
            ],
        )]);
        let policy = AcceptancePolicy::MatchTunnel(matcher(GRE_TUNNEL));
        let (summary, output) = engine(ListCursor::new(&["f1"]), &source, policy).run().unwrap();

        assert_eq!(summary.packets, 2);
        let packets = written(&output);
        assert_eq!(packets[0].data, gre_frame(&inner));
        assert_eq!(packets[1].data, gre_frame(&reply));
    }

    #[test]
    fn stops_at_first_file_past_the_flow_timeout() {
        let source = MemorySource::with(vec![
            ("f1", vec![flow_packet(1000), flow_packet(1100)]),
            ("f2", vec![other_packet(1200), other_packet(1300)]),
            ("f3", vec![other_packet(1699)]),
            ("f4", vec![flow_packet(1700)]),
            ("f5", vec![flow_packet(1800)]),
        ]);
        let policy = AcceptancePolicy::MatchTunnel(matcher(PLAIN));
        let cursor = ListCursor::new(&["f1", "f2", "f3", "f4", "f5"]);
        let (summary, _) = engine(cursor, &source, policy).run().unwrap();

        // Last accepted packet at 1100: f3 starts before 1700, f4 does not.
        assert_eq!(summary.stop_reason, StopReason::FlowIdle);
        assert_eq!(summary.files_scanned, 3);
        assert_eq!(summary.packets, 2);
        assert_eq!(source.opened(), ["f1", "f2", "f3", "f4"]);
    }

    #[test]
    fn filtered_out_file_still_stops_the_walk() {
        let flow = FlowDescriptor::from_json(PLAIN, Path::new("event.json")).unwrap();
        let filter = build_filter(&flow).unwrap();
        let source = MemorySource::with(vec![
            ("f1", vec![flow_packet(1000), flow_packet(1001)]),
            ("f2", vec![other_packet(5000), other_packet(5001)]),
            ("f3", vec![other_packet(9000)]),
        ]);
        let policy = AcceptancePolicy::for_session(Some(&filter), matcher(PLAIN));
        let cursor = ListCursor::new(&["f1", "f2", "f3"]);
        let (summary, output) = engine(cursor, &source, policy)
            .with_filter(Some(filter))
            .run()
            .unwrap();

        // f2 holds nothing the filter passes, yet its first record is past
        // 1001 + 600.
        assert_eq!(summary.stop_reason, StopReason::FlowIdle);
        assert_eq!(summary.files_scanned, 1);
        assert_eq!(summary.packets, 2);
        assert_eq!(written(&output).len(), 2);
        assert_eq!(source.opened(), ["f1", "f2"]);
    }

    #[test]
    fn filtered_out_file_inside_the_timeout_is_scanned() {
        let flow = FlowDescriptor::from_json(PLAIN, Path::new("event.json")).unwrap();
        let filter = build_filter(&flow).unwrap();
        let source = MemorySource::with(vec![
            ("f1", vec![flow_packet(1000)]),
            ("f2", vec![other_packet(1100)]),
            ("f3", vec![other_packet(1200), flow_packet(1250)]),
            ("f4", vec![other_packet(1900)]),
        ]);
        let policy = AcceptancePolicy::for_session(Some(&filter), matcher(PLAIN));
        let cursor = ListCursor::new(&["f1", "f2", "f3", "f4"]);
        let (summary, output) = engine(cursor, &source, policy)
            .with_filter(Some(filter))
            .run()
            .unwrap();

        assert_eq!(summary.stop_reason, StopReason::FlowIdle);
        assert_eq!(summary.files_scanned, 3);
        let packets = written(&output);
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[1].timestamp, Duration::from_secs(1250));
    }

    #[test]
    fn flow_timeout_is_configurable() {
        let source = MemorySource::with(vec![
            ("f1", vec![flow_packet(1000)]),
            ("f2", vec![flow_packet(1005)]),
            ("f3", vec![flow_packet(1020)]),
        ]);
        let policy = AcceptancePolicy::MatchTunnel(matcher(PLAIN));
        let cursor = ListCursor::new(&["f1", "f2", "f3"]);
        let (summary, _) = engine(cursor, &source, policy)
            .with_flow_timeout(Duration::from_secs(10))
            .run()
            .unwrap();

        assert_eq!(summary.packets, 2);
        assert_eq!(summary.stop_reason, StopReason::FlowIdle);
    }

    #[test]
    fn nothing_accepted_gates_on_starting_file() {
        let source = MemorySource::with(vec![
            ("f1", vec![other_packet(1000)]),
            ("f2", vec![other_packet(1500)]),
            ("f3", vec![flow_packet(1600)]),
        ]);
        let policy = AcceptancePolicy::MatchTunnel(matcher(PLAIN));
        let cursor = ListCursor::new(&["f1", "f2", "f3"]);
        let (summary, _) = engine(cursor, &source, policy).run().unwrap();

        assert_eq!(summary.packets, 0);
        assert_eq!(summary.files_scanned, 2);
        assert_eq!(summary.stop_reason, StopReason::FlowIdle);
    }

    #[test]
    fn exhausted_cursor_gives_header_only_output() {
        let source = MemorySource::default();
        let cursor = ListCursor::new(&[]);
        let (summary, output) = engine(cursor, &source, AcceptancePolicy::TrustFilter).run().unwrap();

        assert_eq!(summary.packets, 0);
        assert_eq!(summary.stop_reason, StopReason::NoFiles);
        assert!(source.opened().is_empty());
        assert_eq!(output.len(), 24);
        assert!(written(&output).is_empty());
    }

    #[test]
    fn first_file_open_failure_is_zero_packet_success() {
        let source = MemorySource::default();
        let cursor = ListCursor::new(&["missing"]);
        let (summary, output) = engine(cursor, &source, AcceptancePolicy::TrustFilter).run().unwrap();

        assert_eq!(summary.packets, 0);
        assert_eq!(summary.stop_reason, StopReason::OpenFailed);
        assert!(written(&output).is_empty());
    }

    #[test]
    fn mid_rotation_open_failure_keeps_partial_result() {
        let source = MemorySource::with(vec![
            ("f1", vec![flow_packet(100)]),
            ("f3", vec![flow_packet(200)]),
        ]);
        let cursor = ListCursor::new(&["f1", "f2", "f3"]);
        let (summary, output) = engine(cursor, &source, AcceptancePolicy::TrustFilter).run().unwrap();

        assert_eq!(summary.stop_reason, StopReason::OpenFailed);
        assert_eq!(written(&output).len(), 1);
        assert_eq!(source.opened(), ["f1", "f2"]);
    }

    #[test]
    fn initial_cursor_error_is_fatal() {
        let source = MemorySource::default();
        let cursor = ListCursor::new(&[]).then_fail();
        let result = engine(cursor, &source, AcceptancePolicy::TrustFilter).run();
        assert!(matches!(result, Err(ExtractError::Cursor(_))));
    }

    #[test]
    fn later_cursor_error_stops_cleanly() {
        let source = MemorySource::with(vec![("f1", vec![flow_packet(100)])]);
        let cursor = ListCursor::new(&["f1"]).then_fail();
        let (summary, _) = engine(cursor, &source, AcceptancePolicy::TrustFilter).run().unwrap();

        assert_eq!(summary.packets, 1);
        assert_eq!(summary.stop_reason, StopReason::CursorFailed);
    }

    #[test]
    fn malformed_record_is_skipped() {
        let source = MemorySource::with(vec![(
            "f1",
            vec![flow_packet(100), Record::Malformed, flow_packet(101)],
        )]);
        let (summary, _) = engine(ListCursor::new(&["f1"]), &source, AcceptancePolicy::TrustFilter)
            .run()
            .unwrap();
        assert_eq!(summary.packets, 2);
    }

    #[test]
    fn endless_read_errors_abandon_the_file() {
        // The probe of f1 reads the first bad record.
        let mut records: Vec<Record> = (0..=MAX_CONSECUTIVE_READ_ERRORS)
            .map(|_| Record::Malformed)
            .collect();
        records.push(flow_packet(100));
        let source = MemorySource::with(vec![("f1", records), ("f2", vec![flow_packet(101)])]);

        let cursor = ListCursor::new(&["f1", "f2"]);
        let (summary, _) = engine(cursor, &source, AcceptancePolicy::TrustFilter).run().unwrap();

        assert_eq!(summary.packets, 1);
        assert_eq!(summary.files_scanned, 2);
    }

    #[test]
    fn cold_start_walks_the_whole_rotation() {
        let source = MemorySource::with(vec![
            ("f1", vec![flow_packet(100)]),
            ("f2", vec![other_packet(5000)]),
            ("f3", vec![flow_packet(90_000)]),
        ]);
        let policy = AcceptancePolicy::MatchTunnel(matcher(PLAIN));
        let cursor = ListCursor::new(&["f1", "f2", "f3"]);
        let (summary, _) = engine(cursor, &source, policy).anchored(false).run().unwrap();

        assert_eq!(summary.packets, 2);
        assert_eq!(summary.files_scanned, 3);
        assert_eq!(summary.stop_reason, StopReason::Exhausted);
    }

    #[test]
    fn empty_file_does_not_stop_the_walk() {
        let source = MemorySource::with(vec![
            ("f1", vec![flow_packet(100)]),
            ("f2", vec![]),
            ("f3", vec![flow_packet(200)]),
        ]);
        let cursor = ListCursor::new(&["f1", "f2", "f3"]);
        let (summary, _) = engine(cursor, &source, AcceptancePolicy::TrustFilter).run().unwrap();

        assert_eq!(summary.packets, 2);
        assert_eq!(summary.files_scanned, 3);
    }

    #[test]
    fn rfc3339_rendering() {
        assert_eq!(rfc3339(Duration::from_secs(0)), "1970-01-01T00:00:00+00:00");
    }
}
