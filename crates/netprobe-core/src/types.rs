//! Core probe types shared by the scan engine and the monitors.

use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

// ── Probe configuration ───────────────────────────────────────────

/// Timing and concurrency for one probing phase.
///
/// Built once from settings and shared read-only by every probe of the phase.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeConfig {
    /// Upper bound for a single attempt.
    pub timeout: Duration,
    /// Extra attempts after the first failure.
    pub retry: u32,
    /// Pause after every attempt, successful or not.
    pub rate_limit: Duration,
    /// Maximum probes in flight at once.
    pub concurrency: usize,
}

impl ProbeConfig {
    /// Total attempts a retrying prober may make.
    pub fn attempts(&self) -> u32 {
        self.retry.saturating_add(1)
    }
}

// ── Targets and results ───────────────────────────────────────────

/// An IPv4 host, optionally narrowed to a TCP port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProbeTarget {
    pub ip: Ipv4Addr,
    pub port: Option<u16>,
}

impl ProbeTarget {
    pub fn host(ip: Ipv4Addr) -> Self {
        Self { ip, port: None }
    }

    pub fn socket(ip: Ipv4Addr, port: u16) -> Self {
        Self {
            ip,
            port: Some(port),
        }
    }
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.ip, port),
            None => write!(f, "{}", self.ip),
        }
    }
}

/// Outcome of one probe attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub target: ProbeTarget,
    pub success: bool,
    /// Round-trip or connect time; only present on success.
    pub latency_ms: Option<f64>,
    /// Why the attempt failed, when the probe knows.
    pub reason: Option<String>,
}

impl ProbeResult {
    pub fn succeeded(target: ProbeTarget, latency: Duration) -> Self {
        Self {
            target,
            success: true,
            latency_ms: Some(latency.as_nanos() as f64 / 1_000_000.0),
            reason: None,
        }
    }

    pub fn failed(target: ProbeTarget) -> Self {
        Self {
            target,
            success: false,
            latency_ms: None,
            reason: None,
        }
    }

    pub fn failed_with(target: ProbeTarget, reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::failed(target)
        }
    }
}

// ── Port statistics ───────────────────────────────────────────────

/// Snapshot of one port's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortCount {
    pub total: u64,
    pub success: u64,
}

impl PortCount {
    /// Success rate in percent; 0 when nothing was probed.
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.success as f64 / self.total as f64 * 100.0
        }
    }
}

#[derive(Debug, Default)]
struct AtomicPortCount {
    total: AtomicU64,
    success: AtomicU64,
}

/// Per-port attempt/success counters.
///
/// Every configured port gets an entry up front. Counters are atomic, so
/// workers probing different hosts may record against the same port
/// concurrently through a shared reference.
#[derive(Debug)]
pub struct PortStats {
    order: Vec<u16>,
    counts: HashMap<u16, AtomicPortCount>,
}

impl PortStats {
    /// Create zeroed counters, keeping the first occurrence of each port.
    pub fn new(ports: &[u16]) -> Self {
        let mut order = Vec::with_capacity(ports.len());
        let mut counts = HashMap::with_capacity(ports.len());
        for &port in ports {
            if counts.insert(port, AtomicPortCount::default()).is_none() {
                order.push(port);
            }
        }
        Self { order, counts }
    }

    /// Count a host/port pair about to be probed. Unknown ports are ignored.
    pub fn record_attempt(&self, port: u16) {
        if let Some(count) = self.counts.get(&port) {
            count.total.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_success(&self, port: u16) {
        if let Some(count) = self.counts.get(&port) {
            count.success.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn get(&self, port: u16) -> Option<PortCount> {
        self.counts.get(&port).map(|c| PortCount {
            total: c.total.load(Ordering::Relaxed),
            success: c.success.load(Ordering::Relaxed),
        })
    }

    /// Counters in configuration order.
    pub fn snapshot(&self) -> Vec<(u16, PortCount)> {
        self.order
            .iter()
            .filter_map(|&port| self.get(port).map(|count| (port, count)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

// ── Summary ───────────────────────────────────────────────────────

/// End-of-run aggregate appended to `summary.log`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSummary {
    pub timestamp: String,
    pub alive_host_count: usize,
    pub ports: Vec<(u16, PortCount)>,
}

impl ScanSummary {
    /// Render the block exactly as it is appended to the summary log.
    pub fn render(&self) -> String {
        let mut out = format!(
            "\n===== SUMMARY {} =====\nALIVE HOSTS: {}\n",
            self.timestamp, self.alive_host_count
        );
        for (port, count) in &self.ports {
            out.push_str(&format!(
                "PORT {}: {}/{} ({:.1}%)\n",
                port,
                count.success,
                count.total,
                count.percentage()
            ));
        }
        out
    }
}
