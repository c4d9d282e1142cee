//! sockscope - process-aware network-traffic monitor
//!
//! Breaks live traffic down per process: polls the kernel connection
//! tables, resolves sockets to their owners through descriptor inodes,
//! captures packets on every device, and reports the merged view as JSON
//! or an SQLite trace.

use clap::{Parser, Subcommand};
use sockscope_capture::{list_devices, spawn_captures, ConnectionPoller};
use sockscope_core::{MonitorConfig, Pipeline, Protocol, RunMode, SnapshotExporter};
use sockscope_correlate::Correlator;
use sockscope_export::{JsonExporter, SqliteExporter};
use sockscope_proc::ProcTable;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "sockscope")]
#[command(version)]
#[command(about = "Process-aware network-traffic monitor", long_about = None)]
struct Cli {
    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "SOCKSCOPE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture traffic and attribute it to processes
    Capture {
        /// Emit pretty JSON records on stdout (default)
        #[arg(short, long)]
        json: bool,

        /// Persist into an SQLite store at this path instead
        #[arg(short, long, value_name = "PATH", conflicts_with = "json")]
        db: Option<PathBuf>,

        /// Run for this many seconds, report once, and exit
        #[arg(short, long)]
        seconds: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = MonitorConfig::load(cli.config.as_deref());

    match cli.command {
        Commands::Capture { json, db, seconds } => capture_command(config, json, db, seconds).await,
    }
}

async fn capture_command(
    config: MonitorConfig,
    json: bool,
    db: Option<PathBuf>,
    seconds: Option<u64>,
) -> anyhow::Result<()> {
    // fatal startup checks come first: process table, store, capture opens
    let table = ProcTable::new(&config.proc_root)?;

    let exporter: Box<dyn SnapshotExporter> = match &db {
        Some(path) => {
            info!("persisting to {}", path.display());
            Box::new(SqliteExporter::create(path)?)
        }
        None => {
            if json {
                info!("emitting pretty JSON records");
            }
            Box::new(JsonExporter::stdout())
        }
    };

    let devices = list_devices(&config.proc_root)?;
    info!("capturing on {} devices", devices.len());

    let (conn_tx, conn_rx) = mpsc::channel(config.conn_channel_capacity);
    let (socket_tx, socket_rx) = mpsc::channel(config.conn_channel_capacity);
    let (packet_tx, packet_rx) = mpsc::channel(config.packet_channel_capacity);

    spawn_captures(&devices, config.snaplen, &packet_tx)?;
    drop(packet_tx);

    let poll_interval = Duration::from_millis(config.poll_interval_ms);
    for protocol in [Protocol::Tcp, Protocol::Udp] {
        let poller = ConnectionPoller::new(&config.proc_root, protocol, poll_interval);
        tokio::spawn(poller.run(conn_tx.clone()));
    }
    drop(conn_tx);

    tokio::spawn(Correlator::new(table).run(conn_rx, socket_tx));

    let mut pipeline = Pipeline::new();
    pipeline.add_exporter(exporter);

    let mode = match seconds {
        Some(secs) => RunMode::Batch {
            duration: Duration::from_secs(secs),
        },
        None => RunMode::Continuous {
            report_interval: Duration::from_millis(config.report_interval_ms),
        },
    };

    pipeline.run(socket_rx, packet_rx, mode).await?;
    Ok(())
}
