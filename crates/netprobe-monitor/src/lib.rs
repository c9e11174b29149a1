//! netprobe-monitor: Continuous single-target ping and TCP monitors.
//!
//! A reduced form of the scan engine: one target, one probe per interval,
//! a running summary written to the log when the session ends.

pub mod monitor;
pub mod stats;

pub use monitor::{run_monitor, MonitorPlan};
pub use stats::MonitorStats;
