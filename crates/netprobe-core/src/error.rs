use thiserror::Error;

/// Top-level error type for NetProbe.
///
/// Failed probes are not errors; they are reported as unsuccessful
/// [`ProbeResult`](crate::types::ProbeResult)s. Everything here aborts a run.
#[derive(Error, Debug)]
pub enum NetprobeError {
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    #[error("Unknown tcp_scan.mode: {mode} (expected list, range or full)")]
    PortMode { mode: String },

    #[error("Invalid network {cidr}: {reason}")]
    InvalidNetwork { cidr: String, reason: String },

    #[error("Network {cidr} has {count} hosts, exceeding the limit of {limit}; scan rejected")]
    HostLimitExceeded { cidr: String, count: u64, limit: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Monitor stopped unexpectedly: {0}")]
    MonitorAborted(String),
}

impl NetprobeError {
    pub fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, NetprobeError>;
