//! Continuous single-target monitor loop.
//!
//! One probe per interval until cancelled (or until `count` probes have
//! been made). The closing summary is written on every way out of the
//! loop: normal end, cancellation, or an error while logging.

use std::any::Any;
use std::net::Ipv4Addr;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::time::Duration;

use futures::FutureExt;

use netprobe_core::config::seconds;
use netprobe_core::{Clock, LogBlock, Logbook, NetprobeError, ProbeResult, ProbeTarget, Result, Settings};
use netprobe_scan::probe::Probe;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::stats::MonitorStats;

/// Ping monitor target when `target.host` is unset.
const DEFAULT_PING_HOST: &str = "8.8.8.8";

/// What to watch and how often.
#[derive(Debug, Clone)]
pub struct MonitorPlan {
    /// Verb and target as shown in log lines, e.g. `CONNECT example.com:443`.
    pub label: String,
    pub target: ProbeTarget,
    pub timeout: Duration,
    pub interval: Duration,
    /// Stop after this many probes; run until cancelled when `None`.
    pub count: Option<u64>,
    pub log_path: PathBuf,
}

impl MonitorPlan {
    /// Plan for the ping monitor, or `None` when `ping.enable` is false.
    pub async fn ping(settings: &Settings, logbook: &Logbook, count: Option<u64>) -> Result<Option<Self>> {
        if !settings.ping.enable {
            return Ok(None);
        }
        let host = settings.target.host.as_deref().unwrap_or(DEFAULT_PING_HOST);
        let ip = resolve_ipv4(host).await?;

        Ok(Some(Self {
            label: format!("PING {host}"),
            target: ProbeTarget::host(ip),
            timeout: seconds("ping.timeout", settings.ping.timeout)?,
            interval: seconds("ping.interval", settings.ping.interval)?,
            count,
            log_path: logbook.ping_monitor_path(host),
        }))
    }

    /// Plan for the TCP monitor, or `None` when `tcp.enable` is false.
    pub async fn tcp(settings: &Settings, logbook: &Logbook, count: Option<u64>) -> Result<Option<Self>> {
        if !settings.tcp.enable {
            return Ok(None);
        }
        let host = settings
            .target
            .host
            .as_deref()
            .ok_or_else(|| NetprobeError::invalid("target.host", "required for the TCP monitor"))?;
        let port = settings.tcp.port;
        let ip = resolve_ipv4(host).await?;

        Ok(Some(Self {
            label: format!("CONNECT {host}:{port}"),
            target: ProbeTarget::socket(ip, port),
            timeout: seconds("tcp.timeout", settings.tcp.timeout)?,
            interval: seconds("tcp.interval", settings.tcp.interval)?,
            count,
            log_path: logbook.tcp_monitor_path(host, port),
        }))
    }

    fn render(&self, clock: &Clock, result: &ProbeResult) -> String {
        match (result.success, result.latency_ms) {
            (true, Some(ms)) => format!("[{}] {} OK | {:.1} ms", clock.stamp(), self.label, ms),
            (true, None) => format!("[{}] {} OK", clock.stamp(), self.label),
            (false, _) => match &result.reason {
                Some(reason) => format!("[{}] {} FAIL | {reason}", clock.stamp(), self.label),
                None => format!("[{}] {} FAIL", clock.stamp(), self.label),
            },
        }
    }
}

/// Resolve a host name or dotted quad to its first IPv4 address.
pub async fn resolve_ipv4(host: &str) -> Result<Ipv4Addr> {
    if let Ok(ip) = host.parse::<Ipv4Addr>() {
        return Ok(ip);
    }

    let addrs = tokio::net::lookup_host((host, 0))
        .await
        .map_err(|e| NetprobeError::invalid("target.host", format!("cannot resolve {host}: {e}")))?;

    addrs
        .filter_map(|addr| match addr.ip() {
            std::net::IpAddr::V4(v4) => Some(v4),
            std::net::IpAddr::V6(_) => None,
        })
        .next()
        .ok_or_else(|| NetprobeError::invalid("target.host", format!("{host} has no IPv4 address")))
}

/// Run the monitor until cancelled or `plan.count` is reached.
///
/// Returns the session totals. If logging fails or the probe panics
/// mid-session, the error is recorded in the log, the summary is still
/// written, and the error is returned.
pub async fn run_monitor<P: Probe>(
    probe: &P,
    plan: &MonitorPlan,
    clock: &Clock,
    cancel: &CancellationToken,
) -> Result<MonitorStats> {
    let header = format!("\n===== START {} ({}) =====", clock.stamp(), clock.zone_name());
    let mut block = LogBlock::open(&plan.log_path, &header, None)?;
    let mut stats = MonitorStats::default();

    tracing::info!(target = %plan.target, log = %plan.log_path.display(), "Monitor started");

    let outcome = AssertUnwindSafe(watch(probe, plan, clock, cancel, &mut block, &mut stats))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(NetprobeError::MonitorAborted(panic_message(panic.as_ref()))));
    if let Err(e) = &outcome {
        tracing::error!(target = %plan.target, error = %e, "Monitor stopped by error");
        if let Err(log_err) = block.line(&format!("[{}] [ERROR] {e}", clock.stamp())) {
            tracing::warn!(error = %log_err, "Could not record monitor error");
        }
    }

    let mut trailer = stats.summary_lines();
    trailer.push(format!("===== END   {} ({}) =====", clock.stamp(), clock.zone_name()));
    block.close_with(&trailer)?;

    tracing::info!(
        target = %plan.target,
        total = stats.total,
        success = stats.success,
        fail = stats.fail,
        "Monitor finished"
    );

    outcome.map(|()| stats)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "panic".to_string()
    }
}

async fn watch<P: Probe>(
    probe: &P,
    plan: &MonitorPlan,
    clock: &Clock,
    cancel: &CancellationToken,
    block: &mut LogBlock,
    stats: &mut MonitorStats,
) -> Result<()> {
    loop {
        if cancel.is_cancelled() {
            return Ok(());
        }

        let result = probe.probe(plan.target, plan.timeout).await;
        stats.record(&result);

        let line = plan.render(clock, &result);
        println!("{line}");
        block.line(&line)?;

        if plan.count.is_some_and(|n| stats.total >= n) {
            return Ok(());
        }

        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = sleep(plan.interval) => {}
        }
    }
}
