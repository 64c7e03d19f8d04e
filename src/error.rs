//! Error types, one enum per concern.
//!
//! Only `ConfigError`, `EndpointError`, `CursorError` and `OutputError` ever
//! abort an extraction. Filter and capture errors are recovered inside the
//! engine and only show up in logs.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Can't read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Can't parse JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid IP in field '{field}': {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("Capture file {0} does not exist")]
    MissingCaptureFile(PathBuf),

    #[error("Invalid value for '{key}': {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FilterError {
    #[error("Unsupported protocol '{0}'")]
    UnsupportedProtocol(String),

    #[error("Tunnel has depth {0} but no endpoint addresses")]
    MissingTunnelEndpoint(u8),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EndpointError {
    #[error("Flow mixes address families: {src} and {dst}")]
    MixedFamilies { src: String, dst: String },

    #[error("Unsupported transport protocol '{0}'")]
    UnsupportedProtocol(String),
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Can't open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid capture file {path}: {reason}")]
    Format { path: PathBuf, reason: String },

    #[error("Failed to read packet: {0}")]
    Read(String),
}

#[derive(Error, Debug)]
pub enum CursorError {
    #[error("Can't list capture directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid file format '{0}'")]
    InvalidFormat(String),
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Can't open pcap output file {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Can't write to output file: {0}")]
    Write(String),
}

/// Hard failures of a whole extraction.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error(transparent)]
    Cursor(#[from] CursorError),

    #[error(transparent)]
    Output(#[from] OutputError),
}
