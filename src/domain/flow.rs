//! Flow descriptor loaded from an EVE event document.

use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Deserialize)]
struct RawTunnel {
    #[serde(default)]
    src_ip: Option<String>,
    #[serde(default)]
    dest_ip: Option<String>,
    #[serde(default)]
    src_port: u16,
    #[serde(default)]
    dest_port: u16,
    #[serde(default)]
    proto: String,
    #[serde(default)]
    depth: u8,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(default)]
    capture_file: String,
    src_ip: String,
    dest_ip: String,
    #[serde(default)]
    src_port: u16,
    #[serde(default)]
    dest_port: u16,
    #[serde(default)]
    app_proto: String,
    proto: String,
    #[serde(default)]
    tunnel: Option<RawTunnel>,
}

/// Outer carrier of a tunnelled flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tunnel {
    pub src_ip: Option<IpAddr>,
    pub dest_ip: Option<IpAddr>,
    pub src_port: u16,
    pub dest_port: u16,
    pub proto: String,
    /// Number of encapsulating layers in front of the flow. 0 means none.
    pub depth: u8,
}

/// The flow to extract and where it was first seen.
///
/// Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowDescriptor {
    /// Rotation file the flow was first observed in, if known
    pub capture_file: Option<String>,
    pub src_ip: IpAddr,
    pub dest_ip: IpAddr,
    pub src_port: u16,
    pub dest_port: u16,
    /// Transport protocol name as reported by the sensor
    pub proto: String,
    pub app_proto: String,
    pub tunnel: Option<Tunnel>,
}

impl FlowDescriptor {
    /// Read and parse an event document from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content, path)
    }

    /// Parse an event document. `origin` is only used in error messages.
    pub fn from_json(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        let raw: RawEvent = serde_json::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;

        let tunnel = raw
            .tunnel
            .map(|t| -> Result<Tunnel, ConfigError> {
                Ok(Tunnel {
                    src_ip: parse_optional_ip("tunnel.src_ip", t.src_ip.as_deref())?,
                    dest_ip: parse_optional_ip("tunnel.dest_ip", t.dest_ip.as_deref())?,
                    src_port: t.src_port,
                    dest_port: t.dest_port,
                    proto: t.proto,
                    depth: t.depth,
                })
            })
            .transpose()?;

        let capture_file = if raw.capture_file.is_empty() {
            None
        } else {
            Some(raw.capture_file)
        };

        Ok(Self {
            capture_file,
            src_ip: parse_ip("src_ip", &raw.src_ip)?,
            dest_ip: parse_ip("dest_ip", &raw.dest_ip)?,
            src_port: raw.src_port,
            dest_port: raw.dest_port,
            proto: raw.proto,
            app_proto: raw.app_proto,
            tunnel,
        })
    }

    /// Number of layers to strip before the flow is visible.
    pub fn tunnel_depth(&self) -> u8 {
        self.tunnel.as_ref().map_or(0, |t| t.depth)
    }

    /// Path of the starting file under `pcap_log_dir`, if one is named.
    pub fn starting_file(&self, pcap_log_dir: &Path) -> Option<PathBuf> {
        self.capture_file
            .as_ref()
            .map(|name| pcap_log_dir.join(name))
    }

    /// Check that the starting file, if any, exists on disk.
    pub fn verify_starting_file(&self, pcap_log_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
        match self.starting_file(pcap_log_dir) {
            Some(path) if !path.is_file() => Err(ConfigError::MissingCaptureFile(path)),
            other => Ok(other),
        }
    }
}

fn parse_ip(field: &'static str, value: &str) -> Result<IpAddr, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidAddress {
        field,
        value: value.to_string(),
    })
}

fn parse_optional_ip(field: &'static str, value: Option<&str>) -> Result<Option<IpAddr>, ConfigError> {
    match value {
        None | Some("") => Ok(None),
        Some(v) => parse_ip(field, v).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};
    use tempfile::TempDir;

    const TCP_EVENT: &str = r#"{
        "timestamp": "2021-06-01T10:00:00.000000+0000",
        "capture_file": "log.pcap.1622541600",
        "src_ip": "10.0.0.1",
        "dest_ip": "10.0.0.2",
        "src_port": 43210,
        "dest_port": 80,
        "proto": "TCP",
        "app_proto": "http"
    }"#;

    fn origin() -> &'static Path {
        Path::new("event.json")
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn parses_plain_flow() {
            let flow = FlowDescriptor::from_json(TCP_EVENT, origin()).unwrap();
            assert_eq!(flow.capture_file.as_deref(), Some("log.pcap.1622541600"));
            assert_eq!(flow.src_ip, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
            assert_eq!(flow.dest_port, 80);
            assert_eq!(flow.app_proto, "http");
            assert!(flow.tunnel.is_none());
            assert_eq!(flow.tunnel_depth(), 0);
        }

        #[test]
        fn parses_ipv6_flow_without_ports() {
            let flow = FlowDescriptor::from_json(
                r#"{"src_ip": "2001:db8::1", "dest_ip": "2001:db8::2", "proto": "IPv6-ICMP"}"#,
                origin(),
            )
            .unwrap();
            assert_eq!(flow.src_ip, IpAddr::V6("2001:db8::1".parse::<Ipv6Addr>().unwrap()));
            assert_eq!(flow.src_port, 0);
            assert!(flow.capture_file.is_none());
        }

        #[test]
        fn parses_tunnel() {
            let flow = FlowDescriptor::from_json(
                r#"{
                    "src_ip": "192.168.1.1", "dest_ip": "192.168.1.2",
                    "src_port": 1234, "dest_port": 53, "proto": "UDP",
                    "tunnel": {"src_ip": "172.16.0.1", "dest_ip": "172.16.0.2",
                               "proto": "GRE", "depth": 1}
                }"#,
                origin(),
            )
            .unwrap();
            let tunnel = flow.tunnel.as_ref().unwrap();
            assert_eq!(tunnel.src_ip, Some(IpAddr::V4(Ipv4Addr::new(172, 16, 0, 1))));
            assert_eq!(tunnel.proto, "GRE");
            assert_eq!(flow.tunnel_depth(), 1);
        }

        #[test]
        fn empty_tunnel_addresses_are_absent() {
            let flow = FlowDescriptor::from_json(
                r#"{"src_ip": "10.0.0.1", "dest_ip": "10.0.0.2", "proto": "TCP",
                    "tunnel": {"src_ip": "", "depth": 0}}"#,
                origin(),
            )
            .unwrap();
            assert_eq!(flow.tunnel.unwrap().src_ip, None);
        }

        #[test]
        fn malformed_json_is_parse_error() {
            let result = FlowDescriptor::from_json("{ not json", origin());
            assert!(matches!(result, Err(ConfigError::Parse { .. })));
        }

        #[test]
        fn missing_required_field_is_parse_error() {
            let result = FlowDescriptor::from_json(r#"{"src_ip": "10.0.0.1"}"#, origin());
            assert!(matches!(result, Err(ConfigError::Parse { .. })));
        }

        #[test]
        fn bad_address_is_invalid_address() {
            let result = FlowDescriptor::from_json(
                r#"{"src_ip": "10.0.0.300", "dest_ip": "10.0.0.2", "proto": "TCP"}"#,
                origin(),
            );
            match result {
                Err(ConfigError::InvalidAddress { field, value }) => {
                    assert_eq!(field, "src_ip");
                    assert_eq!(value, "10.0.0.300");
                }
                other => panic!("unexpected result: {:?}", other),
            }
        }

        #[test]
        fn bad_tunnel_address_is_invalid_address() {
            let result = FlowDescriptor::from_json(
                r#"{"src_ip": "10.0.0.1", "dest_ip": "10.0.0.2", "proto": "TCP",
                    "tunnel": {"src_ip": "nope", "depth": 1}}"#,
                origin(),
            );
            assert!(matches!(
                result,
                Err(ConfigError::InvalidAddress { field: "tunnel.src_ip", .. })
            ));
        }
    }

    mod starting_file_tests {
        use super::*;

        #[test]
        fn existing_starting_file_is_returned() {
            let dir = TempDir::new().unwrap();
            fs::write(dir.path().join("log.pcap.1622541600"), b"").unwrap();

            let flow = FlowDescriptor::from_json(TCP_EVENT, origin()).unwrap();
            let start = flow.verify_starting_file(dir.path()).unwrap();
            assert_eq!(start, Some(dir.path().join("log.pcap.1622541600")));
        }

        #[test]
        fn missing_starting_file_fails() {
            let dir = TempDir::new().unwrap();
            let flow = FlowDescriptor::from_json(TCP_EVENT, origin()).unwrap();
            assert!(matches!(
                flow.verify_starting_file(dir.path()),
                Err(ConfigError::MissingCaptureFile(_))
            ));
        }

        #[test]
        fn unknown_start_needs_no_file() {
            let dir = TempDir::new().unwrap();
            let flow = FlowDescriptor::from_json(
                r#"{"src_ip": "10.0.0.1", "dest_ip": "10.0.0.2", "proto": "TCP"}"#,
                origin(),
            )
            .unwrap();
            assert_eq!(flow.verify_starting_file(dir.path()).unwrap(), None);
        }

        #[test]
        fn load_reads_from_disk() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("event.json");
            fs::write(&path, TCP_EVENT).unwrap();
            let flow = FlowDescriptor::load(&path).unwrap();
            assert_eq!(flow.src_port, 43210);
        }

        #[test]
        fn load_missing_document_is_io_error() {
            let dir = TempDir::new().unwrap();
            let result = FlowDescriptor::load(&dir.path().join("nope.json"));
            assert!(matches!(result, Err(ConfigError::Io { .. })));
        }
    }
}
