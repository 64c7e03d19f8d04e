use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

const DEFAULT_CONFIG_PATH: &str = "/etc/flowextract.conf";
const DEFAULT_PCAP_LOG_DIR: &str = "/var/log/suricata";
const DEFAULT_FILE_FORMAT: &str = "log.pcap.%t";

/// How long after its last accepted packet a flow is assumed finished.
pub const DEFAULT_FLOW_TIMEOUT: Duration = Duration::from_secs(600);

/// Settings for one extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractConfig {
    /// Directory holding the capture rotation
    pub pcap_log_dir: PathBuf,
    /// Output capture file, truncated if it exists
    pub output: PathBuf,
    /// Event document describing the flow
    pub event_path: PathBuf,
    /// Rotation file name pattern
    pub file_format: String,
    /// Don't filter at the read layer; match every packet in-process
    pub skip_bpf: bool,
    pub flow_timeout: Duration,
    pub log_level: Option<String>,
}

impl ExtractConfig {
    /// Built-in defaults only.
    pub fn new(output: impl Into<PathBuf>, event_path: impl Into<PathBuf>) -> Self {
        Self {
            pcap_log_dir: PathBuf::from(DEFAULT_PCAP_LOG_DIR),
            output: output.into(),
            event_path: event_path.into(),
            file_format: DEFAULT_FILE_FORMAT.to_string(),
            skip_bpf: false,
            flow_timeout: DEFAULT_FLOW_TIMEOUT,
            log_level: None,
        }
    }

    /// Defaults, then the config file, then environment overrides.
    ///
    /// The config file is `$FLOWEXTRACT_CONFIG` or `/etc/flowextract.conf`
    /// and is optional.
    pub fn load(output: impl Into<PathBuf>, event_path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let config_path = std::env::var("FLOWEXTRACT_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let mut config = Self::new(output, event_path);
        if Path::new(&config_path).exists() {
            config.apply_file(Path::new(&config_path))?;
        }

        // Allow environment variable overrides
        if let Ok(val) = std::env::var("FLOWEXTRACT_PCAP_DIR") {
            config.pcap_log_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("FLOWEXTRACT_FILE_FORMAT") {
            config.file_format = val;
        }
        if let Ok(val) = std::env::var("FLOWEXTRACT_FLOW_TIMEOUT") {
            config.flow_timeout = parse_timeout("FLOWEXTRACT_FLOW_TIMEOUT", &val)?;
        }

        Ok(config)
    }

    fn apply_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let value = value.trim();
                match key.trim() {
                    "pcap_log_dir" => self.pcap_log_dir = PathBuf::from(value),
                    "file_format" => self.file_format = value.to_string(),
                    "flow_timeout" => self.flow_timeout = parse_timeout("flow_timeout", value)?,
                    "skip_bpf" => self.skip_bpf = parse_bool("skip_bpf", value)?,
                    "log_level" => self.log_level = Some(value.to_string()),
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Filter directive for the tracing subscriber.
    ///
    /// A configured `log_level` wins over the `-v` count.
    pub fn tracing_filter(&self, verbosity: u8) -> String {
        if let Some(level) = &self.log_level {
            return level.clone();
        }
        match verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
        .to_string()
    }
}

fn parse_timeout(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse()
        .map(Duration::from_secs)
        .map_err(|_| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        })
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}
