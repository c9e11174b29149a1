//! Port list construction for the TCP phase.

use std::str::FromStr;
use std::time::Duration;

use netprobe_core::config::TcpScanSettings;
use netprobe_core::{NetprobeError, ProbeConfig, Result};

/// Floor for the pacing delay when sweeping every port.
pub const FULL_SWEEP_MIN_RATE_LIMIT: Duration = Duration::from_millis(100);

/// How `tcp_scan` selects ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortMode {
    /// `tcp_scan.ports` as given.
    List,
    /// `tcp_scan.port_range.start..=end`.
    Range,
    /// Every port from 1 to 65535.
    Full,
}

impl FromStr for PortMode {
    type Err = NetprobeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "list" => Ok(Self::List),
            "range" => Ok(Self::Range),
            "full" => Ok(Self::Full),
            _ => Err(NetprobeError::PortMode {
                mode: s.to_string(),
            }),
        }
    }
}

/// Ports to probe plus the probe timing that goes with them.
///
/// Built once before scanning. `full` mode returns a normalized copy of
/// the configured timing (no retries, at least 100 ms pacing) instead of
/// touching the settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PortPlan {
    pub mode: PortMode,
    pub ports: Vec<u16>,
    pub probe: ProbeConfig,
}

impl PortPlan {
    pub fn build(settings: &TcpScanSettings) -> Result<Self> {
        let mode: PortMode = settings.mode.parse()?;
        let mut probe = settings.probe_config()?;

        let ports = match mode {
            PortMode::List => {
                if let Some(&zero) = settings.ports.iter().find(|&&p| p == 0) {
                    return Err(NetprobeError::invalid(
                        "tcp_scan.ports",
                        format!("port {zero} is not probeable"),
                    ));
                }
                settings.ports.clone()
            }
            PortMode::Range => {
                let range = settings.port_range.as_ref().ok_or_else(|| {
                    NetprobeError::invalid("tcp_scan.port_range", "required when mode is range")
                })?;
                if range.start == 0 || range.start > range.end {
                    return Err(NetprobeError::invalid(
                        "tcp_scan.port_range",
                        format!("{}..{} is not a valid range", range.start, range.end),
                    ));
                }
                (range.start..=range.end).collect()
            }
            PortMode::Full => {
                probe.retry = 0;
                probe.rate_limit = probe.rate_limit.max(FULL_SWEEP_MIN_RATE_LIMIT);
                (1..=u16::MAX).collect()
            }
        };

        tracing::debug!(mode = ?mode, ports = ports.len(), "Port plan built");
        Ok(Self { mode, ports, probe })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netprobe_core::config::PortRangeSettings;

    fn settings(mode: &str) -> TcpScanSettings {
        TcpScanSettings {
            enable: true,
            mode: mode.to_string(),
            retry: 3,
            rate_limit: 0.02,
            ..Default::default()
        }
    }

    #[test]
    fn list_mode_keeps_configured_ports() {
        let mut s = settings("list");
        s.ports = vec![22, 80, 443];
        let plan = PortPlan::build(&s).unwrap();
        assert_eq!(plan.ports, vec![22, 80, 443]);
        assert_eq!(plan.probe.retry, 3);
    }

    #[test]
    fn range_mode_is_inclusive() {
        let mut s = settings("range");
        s.port_range = Some(PortRangeSettings { start: 80, end: 82 });
        let plan = PortPlan::build(&s).unwrap();
        assert_eq!(plan.ports, vec![80, 81, 82]);
    }

    #[test]
    fn full_mode_covers_every_port_and_normalizes_timing() {
        let s = settings("full");
        let plan = PortPlan::build(&s).unwrap();
        assert_eq!(plan.ports.len(), 65535);
        assert_eq!(plan.ports.first(), Some(&1));
        assert_eq!(plan.ports.last(), Some(&65535));
        assert_eq!(plan.probe.retry, 0);
        assert_eq!(plan.probe.rate_limit, Duration::from_millis(100));
        // The settings themselves are untouched.
        assert_eq!(s.retry, 3);
    }

    #[test]
    fn full_mode_keeps_slower_configured_pacing() {
        let mut s = settings("full");
        s.rate_limit = 0.5;
        let plan = PortPlan::build(&s).unwrap();
        assert_eq!(plan.probe.rate_limit, Duration::from_millis(500));
    }

    #[test]
    fn unknown_mode_is_port_mode_error() {
        let err = PortPlan::build(&settings("stealth")).unwrap_err();
        assert!(matches!(err, NetprobeError::PortMode { ref mode } if mode == "stealth"));
    }

    #[test]
    fn range_mode_validates_bounds() {
        let mut s = settings("range");
        assert!(PortPlan::build(&s).is_err());
        s.port_range = Some(PortRangeSettings { start: 90, end: 80 });
        assert!(PortPlan::build(&s).is_err());
        s.port_range = Some(PortRangeSettings { start: 0, end: 10 });
        assert!(PortPlan::build(&s).is_err());
    }
}
