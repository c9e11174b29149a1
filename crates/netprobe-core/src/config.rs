//! Configuration for NetProbe.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`NETPROBE_` prefix, `__` between section and key,
//!    e.g. `NETPROBE_PING_SCAN__THREADS=32`)
//! 2. Config file (`config.yaml` by default, format chosen by extension)
//! 3. Defaults
//!
//! Durations are given in seconds and may be fractional.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{NetprobeError, Result};
use crate::types::ProbeConfig;

/// Top-level settings shared by the scanner and the monitors.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub target: TargetSettings,

    #[serde(default)]
    pub ping_scan: PingScanSettings,

    #[serde(default)]
    pub tcp_scan: TcpScanSettings,

    #[serde(default)]
    pub scan: ScanSettings,

    /// Continuous ping monitor.
    #[serde(default)]
    pub ping: PingMonitorSettings,

    /// Continuous TCP connect monitor.
    #[serde(default)]
    pub tcp: TcpMonitorSettings,
}

/// Where results go and how timestamps are rendered.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetSettings {
    /// Directory for all log files (default: "./logs").
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    /// IANA timezone for log timestamps (default: "Asia/Bangkok").
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Host watched by the monitors.
    #[serde(default)]
    pub host: Option<String>,
}

/// How reachability is checked during the ping sweep.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PingMethod {
    /// Run the platform `ping` binary once per attempt.
    #[default]
    System,
    /// Send echo requests from an in-process ICMP socket.
    Icmp,
}

/// Phase 1: host discovery.
#[derive(Debug, Clone, Deserialize)]
pub struct PingScanSettings {
    /// Networks to sweep, in CIDR notation.
    #[serde(default)]
    pub networks: Vec<String>,

    #[serde(default = "default_ping_timeout")]
    pub timeout: f64,

    #[serde(default = "default_ping_retry")]
    pub retry: u32,

    #[serde(default)]
    pub rate_limit: f64,

    /// Concurrent probes per network.
    #[serde(default = "default_ping_threads")]
    pub threads: usize,

    #[serde(default)]
    pub method: PingMethod,
}

/// Inclusive port range for `range` mode.
#[derive(Debug, Clone, Deserialize)]
pub struct PortRangeSettings {
    pub start: u16,
    pub end: u16,
}

/// Phase 2: port probing of live hosts.
#[derive(Debug, Clone, Deserialize)]
pub struct TcpScanSettings {
    #[serde(default)]
    pub enable: bool,

    /// `list`, `range` or `full`; validated when the port plan is built.
    #[serde(default = "default_port_mode")]
    pub mode: String,

    #[serde(default)]
    pub ports: Vec<u16>,

    #[serde(default)]
    pub port_range: Option<PortRangeSettings>,

    #[serde(default = "default_tcp_timeout")]
    pub timeout: f64,

    #[serde(default)]
    pub retry: u32,

    #[serde(default)]
    pub rate_limit: f64,

    /// Hosts probed at once. Ports of a single host are always sequential.
    #[serde(default = "default_tcp_threads")]
    pub threads: usize,
}

/// Pre-flight limits.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanSettings {
    /// Largest network (usable hosts) a run accepts.
    #[serde(default = "default_max_hosts")]
    pub max_hosts: u64,

    /// Print a duration estimate before scanning.
    #[serde(default = "default_true")]
    pub estimate_time: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PingMonitorSettings {
    #[serde(default)]
    pub enable: bool,

    /// Seconds between probes.
    #[serde(default = "default_ping_interval")]
    pub interval: f64,

    #[serde(default = "default_ping_timeout")]
    pub timeout: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TcpMonitorSettings {
    #[serde(default)]
    pub enable: bool,

    #[serde(default = "default_monitor_port")]
    pub port: u16,

    #[serde(default = "default_monitor_tcp_timeout")]
    pub timeout: f64,

    /// Seconds between probes.
    #[serde(default = "default_tcp_interval")]
    pub interval: f64,
}

fn default_log_dir() -> String {
    "./logs".to_string()
}

fn default_timezone() -> String {
    "Asia/Bangkok".to_string()
}

fn default_ping_timeout() -> f64 {
    1.0
}

fn default_ping_retry() -> u32 {
    1
}

fn default_ping_threads() -> usize {
    64
}

fn default_port_mode() -> String {
    "list".to_string()
}

fn default_tcp_timeout() -> f64 {
    1.0
}

fn default_tcp_threads() -> usize {
    1
}

fn default_max_hosts() -> u64 {
    1024
}

fn default_true() -> bool {
    true
}

fn default_ping_interval() -> f64 {
    1.0
}

fn default_monitor_port() -> u16 {
    80
}

fn default_monitor_tcp_timeout() -> f64 {
    3.0
}

fn default_tcp_interval() -> f64 {
    2.0
}

impl Default for TargetSettings {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            timezone: default_timezone(),
            host: None,
        }
    }
}

impl Default for PingScanSettings {
    fn default() -> Self {
        Self {
            networks: Vec::new(),
            timeout: default_ping_timeout(),
            retry: default_ping_retry(),
            rate_limit: 0.0,
            threads: default_ping_threads(),
            method: PingMethod::default(),
        }
    }
}

impl Default for TcpScanSettings {
    fn default() -> Self {
        Self {
            enable: false,
            mode: default_port_mode(),
            ports: Vec::new(),
            port_range: None,
            timeout: default_tcp_timeout(),
            retry: 0,
            rate_limit: 0.0,
            threads: default_tcp_threads(),
        }
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            max_hosts: default_max_hosts(),
            estimate_time: true,
        }
    }
}

impl Default for PingMonitorSettings {
    fn default() -> Self {
        Self {
            enable: false,
            interval: default_ping_interval(),
            timeout: default_ping_timeout(),
        }
    }
}

impl Default for TcpMonitorSettings {
    fn default() -> Self {
        Self {
            enable: false,
            port: default_monitor_port(),
            timeout: default_monitor_tcp_timeout(),
            interval: default_tcp_interval(),
        }
    }
}

impl PingScanSettings {
    pub fn probe_config(&self) -> Result<ProbeConfig> {
        Ok(ProbeConfig {
            timeout: seconds("ping_scan.timeout", self.timeout)?,
            retry: self.retry,
            rate_limit: seconds("ping_scan.rate_limit", self.rate_limit)?,
            concurrency: positive("ping_scan.threads", self.threads)?,
        })
    }
}

impl TcpScanSettings {
    pub fn probe_config(&self) -> Result<ProbeConfig> {
        Ok(ProbeConfig {
            timeout: seconds("tcp_scan.timeout", self.timeout)?,
            retry: self.retry,
            rate_limit: seconds("tcp_scan.rate_limit", self.rate_limit)?,
            concurrency: positive("tcp_scan.threads", self.threads)?,
        })
    }
}

/// Convert a non-negative number of seconds into a `Duration`.
pub fn seconds(key: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| NetprobeError::invalid(key, format!("{value} is not a valid number of seconds")))
}

fn positive(key: &str, value: usize) -> Result<usize> {
    if value == 0 {
        return Err(NetprobeError::invalid(key, "must be at least 1"));
    }
    Ok(value)
}

/// Load settings from a config file plus `NETPROBE_` environment overrides.
///
/// The file must exist; every key inside it is optional.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.is_file() {
        return Err(NetprobeError::ConfigNotFound {
            path: path.display().to_string(),
        });
    }

    let cfg = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(
            config::Environment::with_prefix("NETPROBE")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let settings: Settings = cfg.try_deserialize()?;
    tracing::debug!(path = %path.display(), networks = settings.ping_scan.networks.len(), "Settings loaded");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.target.log_dir, "./logs");
        assert_eq!(settings.target.timezone, "Asia/Bangkok");
        assert_eq!(settings.scan.max_hosts, 1024);
        assert!(settings.scan.estimate_time);
        assert_eq!(settings.tcp_scan.mode, "list");
        assert_eq!(settings.ping_scan.method, PingMethod::System);
        assert_eq!(settings.tcp.port, 80);
    }

    #[test]
    fn test_missing_file_is_config_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_settings(&dir.path().join("config.yaml")).unwrap_err();
        assert!(matches!(err, NetprobeError::ConfigNotFound { .. }));
    }

    #[test]
    fn test_load_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            r#"
target:
  log_dir: /var/log/netprobe
  timezone: UTC
ping_scan:
  networks: ["10.0.0.0/24", "10.0.1.0/30"]
  timeout: 0.5
  retry: 2
  rate_limit: 0.05
  threads: 16
  method: icmp
tcp_scan:
  enable: true
  mode: range
  port_range:
    start: 80
    end: 82
scan:
  max_hosts: 512
  estimate_time: false
"#,
        )
        .unwrap();

        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.target.log_dir, "/var/log/netprobe");
        assert_eq!(settings.ping_scan.networks.len(), 2);
        assert_eq!(settings.ping_scan.method, PingMethod::Icmp);
        assert!(settings.tcp_scan.enable);
        assert_eq!(settings.tcp_scan.port_range.as_ref().map(|r| r.end), Some(82));
        assert_eq!(settings.scan.max_hosts, 512);
        assert!(!settings.scan.estimate_time);

        let ping = settings.ping_scan.probe_config().unwrap();
        assert_eq!(ping.timeout, Duration::from_millis(500));
        assert_eq!(ping.retry, 2);
        assert_eq!(ping.rate_limit, Duration::from_millis(50));
        assert_eq!(ping.concurrency, 16);
    }

    #[test]
    fn test_negative_duration_rejected() {
        let settings = TcpScanSettings {
            rate_limit: -1.0,
            ..Default::default()
        };
        let err = settings.probe_config().unwrap_err();
        assert!(
            matches!(err, NetprobeError::ConfigInvalid { ref key, .. } if key == "tcp_scan.rate_limit")
        );
    }

    #[test]
    fn test_zero_threads_rejected() {
        let settings = PingScanSettings {
            threads: 0,
            ..Default::default()
        };
        assert!(settings.probe_config().is_err());
    }
}
