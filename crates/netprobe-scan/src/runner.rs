//! Scan orchestration: precheck → ping sweep → TCP probing → summary.

use std::net::Ipv4Addr;
use std::sync::Arc;

use netprobe_core::{
    Clock, Logbook, PortStats, ProbeConfig, ProbeTarget, Result, ScanSummary, Settings,
};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::network::{parse_networks, NetworkSpec};
use crate::pool::ScanPool;
use crate::ports::PortPlan;
use crate::precheck::{precheck, Estimate};
use crate::probe::Probe;
use crate::progress::{sweep_bar, NoProgress, ProgressSink};
use crate::retry::probe_with_retry;

/// Everything a finished (or interrupted) run produced.
#[derive(Debug)]
pub struct RunReport {
    pub estimate: Estimate,
    /// Live hosts in discovery order across all networks.
    pub alive: Vec<Ipv4Addr>,
    pub summary: ScanSummary,
    pub interrupted: bool,
}

/// Drives one full scan.
///
/// `P` answers reachability probes in the ping phase, `C` answers TCP
/// connect probes in the port phase.
pub struct ScanRunner<P, C> {
    settings: Settings,
    reach: Arc<P>,
    connect: Arc<C>,
    cancel: CancellationToken,
    show_progress: bool,
}

impl<P, C> ScanRunner<P, C>
where
    P: Probe + 'static,
    C: Probe + 'static,
{
    pub fn new(settings: Settings, reach: P, connect: C, cancel: CancellationToken) -> Self {
        Self {
            settings,
            reach: Arc::new(reach),
            connect: Arc::new(connect),
            cancel,
            show_progress: false,
        }
    }

    /// Draw a progress bar while sweeping each network.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub async fn run(&self) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        self.run_inner()
            .instrument(tracing::info_span!("scan", run_id = %run_id))
            .await
    }

    async fn run_inner(&self) -> Result<RunReport> {
        let clock = Clock::new(&self.settings.target.timezone)?;
        let plan = PortPlan::build(&self.settings.tcp_scan)?;
        let ping = self.settings.ping_scan.probe_config()?;
        let networks = parse_networks(&self.settings.ping_scan.networks)?;

        // Nothing below this line runs for a rejected scan.
        let estimate = precheck(
            &networks,
            plan.ports.len(),
            plan.probe.rate_limit,
            self.settings.scan.max_hosts,
        )?;
        if self.settings.scan.estimate_time {
            println!("\n{estimate}\n");
        }

        let logbook = Logbook::new(&self.settings.target.log_dir)?;
        let stats = Arc::new(PortStats::new(&plan.ports));

        tracing::info!(
            networks = networks.len(),
            hosts = estimate.total_hosts,
            ports = plan.ports.len(),
            "Starting scan"
        );

        let mut alive = Vec::new();
        for net in &networks {
            if self.cancel.is_cancelled() {
                break;
            }
            println!("\nStarting ping sweep of {net}");
            alive.extend(self.sweep_network(net, &ping, &logbook, &clock).await?);
        }
        println!("\nAlive hosts found: {}", alive.len());

        if self.settings.tcp_scan.enable && !self.cancel.is_cancelled() {
            println!("\nStarting TCP probing");
            self.probe_ports(&alive, &plan, &stats).await;
        }

        let summary = ScanSummary {
            timestamp: clock.stamp(),
            alive_host_count: alive.len(),
            ports: stats.snapshot(),
        };
        logbook.append_summary(&summary)?;

        let interrupted = self.cancel.is_cancelled();
        if interrupted {
            tracing::warn!(alive = alive.len(), "Scan interrupted; partial summary written");
        } else {
            tracing::info!(alive = alive.len(), "Scan complete");
        }

        Ok(RunReport {
            estimate,
            alive,
            summary,
            interrupted,
        })
    }

    /// Phase 1 for one network. Successful replies are logged in the order
    /// they complete.
    async fn sweep_network(
        &self,
        net: &NetworkSpec,
        ping: &ProbeConfig,
        logbook: &Logbook,
        clock: &Clock,
    ) -> Result<Vec<Ipv4Addr>> {
        let hosts = net.hosts();
        let total = hosts.len();
        let mut block = logbook.open_ping_scan(net.cidr())?;

        let job = {
            let probe = self.reach.clone();
            let config = ping.clone();
            move |ip: Ipv4Addr| {
                let probe = probe.clone();
                let config = config.clone();
                async move { probe_with_retry(&*probe, ProbeTarget::host(ip), &config).await }
            }
        };

        let mut progress: Box<dyn ProgressSink> = if self.show_progress {
            Box::new(sweep_bar(total))
        } else {
            Box::new(NoProgress)
        };

        let mut alive = Vec::new();
        let mut write_error = None;
        let pool = ScanPool::new(ping.concurrency, self.cancel.clone());
        pool.run(hosts, job, progress.as_mut(), |outcome| {
            let Some(Some(result)) = &outcome.output else {
                return;
            };
            alive.push(outcome.target);
            let line = format!(
                "[{}] PING {} {:.1} ms",
                clock.stamp(),
                result.target,
                result.latency_ms.unwrap_or_default()
            );
            if let Err(e) = block.line(&line) {
                write_error.get_or_insert(e);
            }
        })
        .await;
        progress.finish();

        if let Some(e) = write_error {
            return Err(e.into());
        }
        block.close()?;

        tracing::info!(cidr = %net, hosts = total, alive = alive.len(), "Ping sweep complete");
        Ok(alive)
    }

    /// Phase 2. Each host's ports are probed one after another; hosts run
    /// in parallel up to `tcp_scan.threads`.
    async fn probe_ports(&self, alive: &[Ipv4Addr], plan: &PortPlan, stats: &Arc<PortStats>) {
        let ports: Arc<[u16]> = Arc::from(plan.ports.as_slice());
        let job = {
            let probe = self.connect.clone();
            let config = plan.probe.clone();
            let stats = stats.clone();
            let cancel = self.cancel.clone();
            move |ip: Ipv4Addr| {
                let probe = probe.clone();
                let config = config.clone();
                let stats = stats.clone();
                let cancel = cancel.clone();
                let ports = ports.clone();
                async move { probe_host_ports(&*probe, ip, &ports, &config, &stats, &cancel).await }
            }
        };

        let pool = ScanPool::new(plan.probe.concurrency, self.cancel.clone());
        let outcomes = pool.run(alive.to_vec(), job, &mut NoProgress, |_| {}).await;

        let open: usize = outcomes.iter().filter_map(|o| o.output).sum();
        tracing::info!(hosts = outcomes.len(), open, "TCP probing complete");
    }
}

/// Probe every port of one host in order, returning how many answered.
async fn probe_host_ports<C: Probe>(
    probe: &C,
    ip: Ipv4Addr,
    ports: &[u16],
    config: &ProbeConfig,
    stats: &PortStats,
    cancel: &CancellationToken,
) -> usize {
    let mut open = 0;
    for &port in ports {
        if cancel.is_cancelled() {
            break;
        }
        stats.record_attempt(port);
        if let Some(result) = probe_with_retry(probe, ProbeTarget::socket(ip, port), config).await {
            stats.record_success(port);
            open += 1;
            println!(
                "[TCP OK] {} {:.1} ms",
                result.target,
                result.latency_ms.unwrap_or_default()
            );
        }
    }
    open
}
