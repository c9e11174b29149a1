//! CLI entry point for the netprobe network scanner.

use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

use netprobe_core::config::load_settings;
use netprobe_scan::probe::{Reachability, TcpProbe};
use netprobe_scan::ScanRunner;

#[derive(Parser)]
#[command(name = "netprobe")]
#[command(about = "Ping sweep IPv4 networks and probe TCP ports on live hosts")]
struct Cli {
    /// Configuration file (YAML, TOML or JSON by extension).
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Skip the pre-scan duration estimate.
    #[arg(long)]
    no_estimate: bool,

    /// Emit diagnostics as JSON.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let mut settings = load_settings(&cli.config)?;
    if cli.no_estimate {
        settings.scan.estimate_time = false;
    }

    let reach = Reachability::for_method(settings.ping_scan.method)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted; finishing in-flight probes...");
            on_signal.cancel();
        }
    });

    let runner = ScanRunner::new(settings, reach, TcpProbe, cancel).with_progress(true);
    let report = runner.run().await?;

    if report.interrupted {
        println!("\nNetProbe scan interrupted; partial summary written");
    } else {
        println!("\nNetProbe scan complete");
    }

    Ok(())
}
