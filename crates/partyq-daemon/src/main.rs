//! partyq daemon entry point.
//!
//! Starts the session server (framed JSON-RPC over TCP) and the HTTP status
//! endpoints.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use partyq_daemon::Config;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// partyq daemon - listening-party session server
#[derive(Parser, Debug)]
#[command(name = "partyq-daemon")]
#[command(version, about, long_about = None)]
struct Args {
    /// Config file (defaults to `<config dir>/partyq/config.json`)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Address for party clients, overrides `server.listenAddr`
    #[arg(long, value_name = "ADDR")]
    listen: Option<SocketAddr>,

    /// Address for the status endpoints, overrides `server.statusAddr`
    #[arg(long, value_name = "ADDR")]
    status: Option<SocketAddr>,
}

/// Set up logging with file output for debugging.
/// In debug builds, defaults to debug level and logs to timestamped file.
/// In release builds, defaults to info level and logs to stderr.
fn setup_logging() {
    let default_level = if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("partyq={default_level}")));

    if cfg!(debug_assertions) {
        let temp_dir = std::env::temp_dir();
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let log_filename = format!("partyq-daemon-{timestamp}.log");
        let log_path = temp_dir.join(&log_filename);

        #[cfg(unix)]
        {
            let symlink_path = temp_dir.join("partyq-daemon.log");
            let _ = std::fs::remove_file(&symlink_path);
            let _ = std::os::unix::fs::symlink(&log_path, &symlink_path);
        }

        let file_appender = tracing_appender::rolling::never(&temp_dir, &log_filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        std::mem::forget(guard);

        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_line_number(true);

        let stderr_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(true);

        tracing_subscriber::registry()
            .with(file_layer)
            .with(stderr_layer)
            .with(filter)
            .init();

        eprintln!("Logging to: {} (and stderr)", log_path.display());
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
}

fn load_config(args: &Args) -> partyq_daemon::Result<Config> {
    let mut config = match args.config.clone().or_else(Config::default_path) {
        Some(path) => {
            info!("Loading config from {}", path.display());
            Config::load(&path)?
        }
        None => Config::default(),
    };

    if let Some(addr) = args.listen {
        config.server.listen_addr = addr;
    }
    if let Some(addr) = args.status {
        config.server.status_addr = addr;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    setup_logging();

    info!("Starting partyq daemon...");

    let config = load_config(&args)?;
    partyq_daemon::run(config).await?;

    info!("partyq daemon stopped");
    Ok(())
}
