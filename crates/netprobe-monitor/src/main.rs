//! CLI entry point for the continuous ping and TCP monitors.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use tracing_subscriber::{fmt, EnvFilter};

use netprobe_core::config::load_settings;
use netprobe_core::{Clock, Logbook};
use netprobe_monitor::{run_monitor, MonitorPlan};
use netprobe_scan::probe::{Reachability, TcpProbe};

#[derive(Parser)]
#[command(name = "netprobe-monitor")]
#[command(about = "Watch one host continuously by ping or TCP connect")]
struct Cli {
    /// Configuration file (YAML, TOML or JSON by extension).
    #[arg(short, long, default_value = "config.yaml", global = true)]
    config: PathBuf,

    /// Emit diagnostics as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ping target.host every ping.interval seconds.
    Ping {
        /// Stop after this many probes.
        #[arg(short = 'n', long)]
        count: Option<u64>,
    },
    /// Connect to target.host:tcp.port every tcp.interval seconds.
    Tcp {
        /// Stop after this many probes.
        #[arg(short = 'n', long)]
        count: Option<u64>,
    },
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

    let settings = load_settings(&cli.config)?;
    let clock = Clock::new(&settings.target.timezone)?;
    let logbook = Logbook::new(&settings.target.log_dir)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let span = tracing::info_span!("monitor", run_id = %uuid::Uuid::new_v4());

    let stats = match cli.command {
        Commands::Ping { count } => {
            let Some(plan) = MonitorPlan::ping(&settings, &logbook, count).await? else {
                println!("Ping monitor is disabled (ping.enable = false)");
                return Ok(());
            };
            let probe = Reachability::for_method(settings.ping_scan.method)?;
            run_monitor(&probe, &plan, &clock, &cancel).instrument(span).await?
        }
        Commands::Tcp { count } => {
            let Some(plan) = MonitorPlan::tcp(&settings, &logbook, count).await? else {
                println!("TCP monitor is disabled (tcp.enable = false)");
                return Ok(());
            };
            run_monitor(&TcpProbe, &plan, &clock, &cancel).instrument(span).await?
        }
    };

    println!();
    for line in stats.summary_lines() {
        println!("{line}");
    }

    Ok(())
}
