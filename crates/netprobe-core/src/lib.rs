//! netprobe-core: Shared settings, types, and log handling for NetProbe.
//!
//! This crate provides the pieces every NetProbe binary needs:
//! - Settings loaded from `config.yaml` and `NETPROBE_` environment variables
//! - Probe types (targets, results, per-port counters) shared by the scan
//!   engine and the continuous monitors
//! - Timezone-aware timestamps for log lines
//! - Append-only log files with scoped header/footer blocks
//! - Common error types

pub mod clock;
pub mod config;
pub mod error;
pub mod logbook;
pub mod types;

pub use clock::Clock;
pub use config::Settings;
pub use error::{NetprobeError, Result};
pub use logbook::{LogBlock, Logbook};
pub use types::{PortCount, PortStats, ProbeConfig, ProbeResult, ProbeTarget, ScanSummary};
