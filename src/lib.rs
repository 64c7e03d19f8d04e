//! Flowextract - pull one flow out of a pcap-log rotation.
//!
//! Given a Suricata-style event describing a flow (optionally tunnelled) and
//! the file it was first seen in, walk the capture rotation from that file
//! and write the flow's packets into a standalone pcap file. The walk stops
//! once the next file starts well after the flow's last packet.

pub mod capture;
pub mod config;
pub mod cursor;
pub mod detector;
pub mod domain;
pub mod error;
pub mod extract;
pub mod filter;
pub mod parser;

pub use config::ExtractConfig;
pub use error::ExtractError;
pub use extract::{extract_pcap_file, ExtractSummary, StopReason};
