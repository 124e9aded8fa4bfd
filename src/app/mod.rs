//! `rolling-appender` binary: reads lines from stdin and writes them through
//! an [`AsyncRollingAppender`](crate::appender::AsyncRollingAppender).

pub mod config;
pub mod logging_system;

pub use config::{AppenderConfig, Cli, ConfigError, DiagnosticLevel, LogFormat, RollingConfig};
pub use logging_system::{InitializationError, LoggingSystem, setup_logging_safe};

use crate::appender::{AppenderBuilder, AsyncRollingAppender};
use crate::domain::{LogEvent, LogLevel};
use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

/// Split an optional level prefix (`ERROR msg`, `[warn] msg`, `INFO: msg`)
/// from a line.
pub fn split_level(line: &str, default: LogLevel) -> (LogLevel, &str) {
    let trimmed = line.trim_start();
    let Some((head, rest)) = trimmed.split_once(char::is_whitespace) else {
        return match parse_level_token(trimmed) {
            Some(level) => (level, ""),
            None => (default, line),
        };
    };
    match parse_level_token(head) {
        Some(level) => (level, rest.trim_start()),
        None => (default, line),
    }
}

fn parse_level_token(token: &str) -> Option<LogLevel> {
    let token = token
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .or_else(|| token.strip_suffix(':'))
        .unwrap_or(token);
    if token.is_empty() || !token.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    token.parse().ok()
}

async fn pump_stdin(appender: &AsyncRollingAppender, cli: &Cli) -> anyhow::Result<u64> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut count = 0u64;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    info!("Reached end of input");
                    break;
                };
                let (level, message) = split_level(&line, cli.default_level);
                let event = LogEvent::new(level, cli.source.as_str(), message);
                // submit may block on a full queue
                tokio::task::block_in_place(|| appender.submit(event));
                count += 1;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received interrupt signal, shutting down");
                break;
            }
        }
    }

    Ok(count)
}

pub async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(e) = setup_logging_safe(cli.log_level, cli.log_format) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let config = cli.appender_config().context("Invalid appender configuration")?;
    info!(
        name = %config.name,
        file = %config.file.display(),
        capacity = config.buffer_capacity,
        blocking = config.blocking,
        "Starting rolling appender"
    );

    let appender = AppenderBuilder::from_config(&config).context("Failed to start appender")?;
    let result = pump_stdin(&appender, &cli).await;

    let closing = appender.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || closing.close()).await {
        warn!(error = %e, "Close task failed");
    }

    let metrics = appender.metrics();
    info!(
        lines = *result.as_ref().unwrap_or(&0),
        written = metrics.events_written,
        discarded = metrics.discarded,
        rollovers = metrics.rollovers,
        bytes = metrics.bytes_written,
        "Appender stopped"
    );

    result.map(|_| ())
}
