//! netprobe-scan: Concurrent ping sweep and TCP port probe engine.
//!
//! Expands configured IPv4 networks into hosts, finds live ones with
//! paced, retried reachability probes under a bounded worker pool, probes
//! configured TCP ports on each live host, and appends per-network and
//! summary logs.

pub mod network;
pub mod pool;
pub mod ports;
pub mod precheck;
pub mod probe;
pub mod progress;
pub mod retry;
pub mod runner;

pub use runner::{RunReport, ScanRunner};
