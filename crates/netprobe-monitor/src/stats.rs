//! Running totals for a monitor session.

use netprobe_core::ProbeResult;

/// Counts and round-trip extremes since the monitor started.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorStats {
    pub total: u64,
    pub success: u64,
    pub fail: u64,
    rtt_sum: f64,
    rtt_min: Option<f64>,
    rtt_max: Option<f64>,
}

impl MonitorStats {
    pub fn record(&mut self, result: &ProbeResult) {
        self.total += 1;
        match (result.success, result.latency_ms) {
            (true, Some(ms)) => {
                self.success += 1;
                self.rtt_sum += ms;
                self.rtt_min = Some(self.rtt_min.map_or(ms, |m| m.min(ms)));
                self.rtt_max = Some(self.rtt_max.map_or(ms, |m| m.max(ms)));
            }
            (true, None) => self.success += 1,
            (false, _) => self.fail += 1,
        }
    }

    /// Mean RTT of successful probes; 0 when there were none.
    pub fn avg_rtt(&self) -> f64 {
        if self.success == 0 {
            0.0
        } else {
            self.rtt_sum / self.success as f64
        }
    }

    pub fn min_rtt(&self) -> f64 {
        self.rtt_min.unwrap_or_default()
    }

    pub fn max_rtt(&self) -> f64 {
        self.rtt_max.unwrap_or_default()
    }

    /// The closing block written to the monitor log.
    pub fn summary_lines(&self) -> Vec<String> {
        vec![
            "===== SUMMARY =====".to_string(),
            format!("TOTAL:   {}", self.total),
            format!("SUCCESS: {}", self.success),
            format!("FAIL:    {}", self.fail),
            format!("AVG RTT: {:.1} ms", self.avg_rtt()),
            format!("MIN RTT: {:.1} ms", self.min_rtt()),
            format!("MAX RTT: {:.1} ms", self.max_rtt()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netprobe_core::ProbeTarget;
    use std::net::Ipv4Addr;
    use std::time::Duration;

    fn target() -> ProbeTarget {
        ProbeTarget::socket(Ipv4Addr::new(192, 0, 2, 1), 443)
    }

    #[test]
    fn empty_session_reports_zeroes() {
        let stats = MonitorStats::default();
        assert_eq!(stats.avg_rtt(), 0.0);
        assert_eq!(stats.summary_lines()[1], "TOTAL:   0");
        assert_eq!(stats.summary_lines()[6], "MAX RTT: 0.0 ms");
    }

    #[test]
    fn tracks_rtt_extremes_of_successes_only() {
        let mut stats = MonitorStats::default();
        for ms in [10, 30, 20] {
            stats.record(&ProbeResult::succeeded(target(), Duration::from_millis(ms)));
        }
        stats.record(&ProbeResult::failed(target()));

        assert_eq!(stats.total, 4);
        assert_eq!(stats.success, 3);
        assert_eq!(stats.fail, 1);
        assert_eq!(stats.avg_rtt(), 20.0);
        assert_eq!(stats.min_rtt(), 10.0);
        assert_eq!(stats.max_rtt(), 30.0);
        assert_eq!(
            stats.summary_lines(),
            vec![
                "===== SUMMARY =====",
                "TOTAL:   4",
                "SUCCESS: 3",
                "FAIL:    1",
                "AVG RTT: 20.0 ms",
                "MIN RTT: 10.0 ms",
                "MAX RTT: 30.0 ms",
            ]
        );
    }
}
