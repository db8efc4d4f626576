use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use quota_gate::config::{GateConfig, LoggingConfig};
use quota_gate::error::Result as GateResult;
use quota_gate::ratelimit::{RateLimit, Sweeper};

/// Lines buffered between the reader thread and the decision loop.
const LINE_BUFFER: usize = 64;

/// Admit or deny client identifiers read from stdin, one per line.
#[derive(Debug, Parser)]
#[command(name = "quota-gate", version, about)]
struct Cli {
    /// YAML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter directive, overrides the settings file
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Print the effective settings and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = GateConfig::load(cli.config.as_deref()).context("Failed to load settings")?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json_logs;

    if cli.print_config {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    init_tracing(&config.logging);

    info!("Starting quota-gate");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &cli.config {
        info!(path = %path.display(), "Loaded configuration file");
    }

    let limiter = Arc::new(
        config
            .limiter
            .build()
            .context("Failed to build rate limiter")?,
    );
    info!(kind = limiter.kind(), "Rate limiter ready");

    let sweeper = config
        .limiter
        .sweep_interval()
        .map(|interval| Sweeper::spawn(Arc::clone(&limiter), interval));

    let lines = spawn_line_reader(BufReader::new(io::stdin()))
        .context("Failed to start stdin reader")?;

    tokio::select! {
        result = serve_lines(&limiter, lines) => result?,
        _ = shutdown_signal() => {}
    }

    if let Some(sweeper) = sweeper {
        sweeper.shutdown().await;
    }

    info!(tracked_clients = limiter.tracked_clients(), "quota-gate stopped");
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Read `reader` line by line on a dedicated thread.
///
/// The thread is detached from the runtime, so shutdown never waits on a
/// pending read. It exits at EOF or when the receiver goes away.
fn spawn_line_reader<R>(reader: R) -> io::Result<mpsc::Receiver<io::Result<String>>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(LINE_BUFFER);

    thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in reader.lines() {
                let failed = line.is_err();
                if tx.blocking_send(line).is_err() || failed {
                    break;
                }
            }
            debug!("Line reader finished");
        })?;

    Ok(rx)
}

/// Decide on each line until the reader closes.
async fn serve_lines(
    limiter: &RateLimit,
    mut lines: mpsc::Receiver<io::Result<String>>,
) -> anyhow::Result<()> {
    while let Some(line) = lines.recv().await {
        let line = line.context("Failed to read stdin")?;
        let client_id = line.trim();
        println!("{}", render_decision(client_id, &limiter.allow(client_id)));
    }

    info!("Input closed");
    Ok(())
}

/// Format one decision as `ALLOW <id>`, `DENY <id>` or `DENY <id> <reason>`.
fn render_decision(client_id: &str, decision: &GateResult<bool>) -> String {
    let shown = if client_id.is_empty() {
        "<empty>"
    } else {
        client_id
    };

    match decision {
        Ok(true) => format!("ALLOW {}", shown),
        Ok(false) => format!("DENY {}", shown),
        Err(e) => format!("DENY {} {}", shown, e),
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
