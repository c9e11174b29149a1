//! Single-attempt probe executors.
//!
//! A probe never fails with an error: refusals, timeouts and unexpected
//! local failures (socket creation, spawning `ping`) all come back as an
//! unsuccessful [`ProbeResult`], with the cause logged at `debug`.

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::process::Stdio;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};

use netprobe_core::config::PingMethod;
use netprobe_core::{ProbeResult, ProbeTarget, Result};
use surge_ping::{Client, Config, PingIdentifier, PingSequence};
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::time::timeout;

/// Extra time granted to the `ping` child for process start-up and exit.
const SPAWN_GRACE: Duration = Duration::from_millis(500);

const ICMP_PAYLOAD: [u8; 56] = [0; 56];

/// One network probe with a deadline.
pub trait Probe: Send + Sync {
    fn probe(&self, target: ProbeTarget, timeout: Duration)
        -> impl Future<Output = ProbeResult> + Send;
}

// ── TCP connect ───────────────────────────────────────────────────

/// Full TCP handshake against `target.ip:target.port`.
///
/// The stream is dropped as soon as the handshake completes.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpProbe;

impl Probe for TcpProbe {
    fn probe(
        &self,
        target: ProbeTarget,
        deadline: Duration,
    ) -> impl Future<Output = ProbeResult> + Send {
        async move {
            let Some(port) = target.port else {
                tracing::debug!(target = %target, "TCP probe without a port");
                return ProbeResult::failed_with(target, "no port given");
            };

            let addr = SocketAddr::from((target.ip, port));
            let start = Instant::now();
            match timeout(deadline, TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => {
                    let latency = start.elapsed();
                    drop(stream);
                    ProbeResult::succeeded(target, latency)
                }
                Ok(Err(e)) => {
                    tracing::debug!(target = %target, error = %e, "TCP connect failed");
                    ProbeResult::failed_with(target, e.to_string())
                }
                Err(_) => {
                    tracing::debug!(target = %target, "TCP connect timed out");
                    ProbeResult::failed_with(target, "timed out")
                }
            }
        }
    }
}

// ── System ping ───────────────────────────────────────────────────

/// Sends one echo request by running the platform `ping` binary.
///
/// Exit status 0 counts as a reply. The child is killed if it is still
/// running when the deadline passes.
#[derive(Debug, Clone)]
pub struct SystemPing {
    binary: String,
}

impl SystemPing {
    pub fn new(binary: &str) -> Self {
        Self {
            binary: binary.to_string(),
        }
    }

    /// Arguments for a single echo with the given wait time.
    pub fn args(ip: Ipv4Addr, wait: Duration) -> Vec<String> {
        let millis = wait.as_millis().max(1);
        if cfg!(windows) {
            vec!["-n".into(), "1".into(), "-w".into(), millis.to_string(), ip.to_string()]
        } else if cfg!(target_os = "macos") {
            vec!["-c".into(), "1".into(), "-W".into(), millis.to_string(), ip.to_string()]
        } else {
            // iputils only takes whole seconds for -W.
            let secs = wait.as_secs_f64().ceil().max(1.0) as u64;
            vec!["-c".into(), "1".into(), "-W".into(), secs.to_string(), ip.to_string()]
        }
    }
}

impl Default for SystemPing {
    fn default() -> Self {
        Self::new("ping")
    }
}

impl Probe for SystemPing {
    fn probe(
        &self,
        target: ProbeTarget,
        deadline: Duration,
    ) -> impl Future<Output = ProbeResult> + Send {
        async move {
            let mut command = Command::new(&self.binary);
            command
                .args(Self::args(target.ip, deadline))
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true);

            let start = Instant::now();
            match timeout(deadline + SPAWN_GRACE, command.status()).await {
                Ok(Ok(status)) if status.success() => ProbeResult::succeeded(target, start.elapsed()),
                Ok(Ok(status)) => {
                    tracing::debug!(target = %target, code = ?status.code(), "No echo reply");
                    ProbeResult::failed_with(target, "no reply")
                }
                Ok(Err(e)) => {
                    tracing::debug!(target = %target, binary = %self.binary, error = %e, "Failed to run ping");
                    ProbeResult::failed_with(target, format!("cannot run {}: {e}", self.binary))
                }
                Err(_) => {
                    tracing::debug!(target = %target, "ping did not exit before the deadline");
                    ProbeResult::failed_with(target, "timed out")
                }
            }
        }
    }
}

// ── In-process ICMP ───────────────────────────────────────────────

/// Echo requests from an ICMP socket shared by every probe of a run.
///
/// Opening the socket may need `CAP_NET_RAW` or an unprivileged ICMP
/// socket range (`net.ipv4.ping_group_range`) on Linux.
pub struct IcmpProbe {
    client: Client,
    next_id: AtomicU16,
}

impl IcmpProbe {
    pub fn new() -> std::io::Result<Self> {
        let client = Client::new(&Config::default())?;
        Ok(Self {
            client,
            next_id: AtomicU16::new(seed_identifier()),
        })
    }
}

/// Starting identifier derived from the clock so concurrent runs differ.
fn seed_identifier() -> u16 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    ((nanos % 0xFFFF) as u16).wrapping_add(1)
}

impl Probe for IcmpProbe {
    fn probe(
        &self,
        target: ProbeTarget,
        deadline: Duration,
    ) -> impl Future<Output = ProbeResult> + Send {
        async move {
            let id = PingIdentifier(self.next_id.fetch_add(1, Ordering::Relaxed));
            let mut pinger = self.client.pinger(IpAddr::V4(target.ip), id).await;
            pinger.timeout(deadline);

            match pinger.ping(PingSequence(0), &ICMP_PAYLOAD).await {
                Ok((_packet, rtt)) => ProbeResult::succeeded(target, rtt),
                Err(e) => {
                    tracing::debug!(target = %target, error = %e, "No ICMP reply");
                    ProbeResult::failed_with(target, e.to_string())
                }
            }
        }
    }
}

// ── Method selection ──────────────────────────────────────────────

/// The reachability probe chosen by `ping_scan.method`.
pub enum Reachability {
    System(SystemPing),
    Icmp(IcmpProbe),
}

impl Reachability {
    pub fn for_method(method: PingMethod) -> Result<Self> {
        match method {
            PingMethod::System => Ok(Self::System(SystemPing::default())),
            PingMethod::Icmp => Ok(Self::Icmp(IcmpProbe::new()?)),
        }
    }
}

impl Probe for Reachability {
    fn probe(
        &self,
        target: ProbeTarget,
        deadline: Duration,
    ) -> impl Future<Output = ProbeResult> + Send {
        async move {
            match self {
                Self::System(p) => p.probe(target, deadline).await,
                Self::Icmp(p) => p.probe(target, deadline).await,
            }
        }
    }
}
