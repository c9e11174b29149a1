//! Pre-flight host-count limit and duration estimate.

use std::fmt;
use std::time::Duration;

use netprobe_core::{NetprobeError, Result};

use crate::network::NetworkSpec;

/// What a run is about to do, computed before any probe is sent.
#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    pub total_hosts: u64,
    pub port_count: u64,
    pub total_tasks: u64,
    pub estimated: Duration,
}

/// Reject the run if any network is larger than `max_hosts`, otherwise
/// estimate `total_hosts × ports × rate_limit`.
///
/// Pure: nothing is written and nothing is probed, whatever the outcome.
pub fn precheck(
    networks: &[NetworkSpec],
    port_count: usize,
    rate_limit: Duration,
    max_hosts: u64,
) -> Result<Estimate> {
    let mut total_hosts: u64 = 0;

    for net in networks {
        let count = net.usable_host_count();
        if count > max_hosts {
            return Err(NetprobeError::HostLimitExceeded {
                cidr: net.cidr().to_string(),
                count,
                limit: max_hosts,
            });
        }
        total_hosts += count;
    }

    let port_count = port_count as u64;
    let total_tasks = total_hosts.saturating_mul(port_count);
    let estimated = pacing_total(rate_limit, total_tasks);

    Ok(Estimate {
        total_hosts,
        port_count,
        total_tasks,
        estimated,
    })
}

/// `rate_limit × tasks` in exact nanoseconds, saturating at `Duration::MAX`.
fn pacing_total(rate_limit: Duration, tasks: u64) -> Duration {
    const NANOS_PER_SEC: u128 = 1_000_000_000;
    let nanos = rate_limit.as_nanos().saturating_mul(u128::from(tasks));
    match u64::try_from(nanos / NANOS_PER_SEC) {
        Ok(secs) => Duration::new(secs, (nanos % NANOS_PER_SEC) as u32),
        Err(_) => Duration::MAX,
    }
}

impl fmt::Display for Estimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.estimated.as_secs_f64();
        writeln!(f, "====== Scan estimate ======")?;
        writeln!(f, "Target IPs:        {}", self.total_hosts)?;
        writeln!(f, "Ports per host:    {}", self.port_count)?;
        writeln!(f, "Total connections: {}", self.total_tasks)?;
        writeln!(f, "Estimated time:    {:.1}s (~{:.1}min)", secs, secs / 60.0)?;
        write!(f, "===========================")
    }
}
