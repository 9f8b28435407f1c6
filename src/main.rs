mod cli;
mod config;
mod engine;
mod error;
mod metrics;
mod model;
mod orchestrator;
mod server;
mod storage;
mod text_summary;
#[cfg(feature = "tui")]
mod tui;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_FILE: &str = "dialer.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. The dashboard owns the terminal, so in that
/// mode logs go to `<data_dir>/dialer.log` instead of stderr.
fn init_tracing(args: &cli::Cli) -> Result<Option<WorkerGuard>> {
    #[cfg(feature = "tui")]
    {
        if matches!(args.command, cli::Command::Tui) {
            let dir = args.settings.data_dir();
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create data dir {}", dir.display()))?;
            let appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .with(env_filter())
                .init();
            return Ok(Some(guard));
        }
    }

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(env_filter())
        .init();
    Ok(None)
}

#[tokio::main]
async fn main() -> Result<()> {
    // `.env` must be loaded before clap reads environment fallbacks.
    dotenvy::dotenv().ok();
    let args = cli::Cli::parse();
    let _log_guard = init_tracing(&args)?;

    cli::run(args).await
}
