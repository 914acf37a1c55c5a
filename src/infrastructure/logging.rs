//! Logging initialization
//!
//! Console logging through an `EnvFilter`, with optional daily-rotated
//! file output. The non-blocking writer guard is parked in a process
//! global so file logging survives for the program's lifetime.

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::infrastructure::config::LoggingConfig;

static LOG_GUARDS: Lazy<Mutex<Vec<WorkerGuard>>> = Lazy::new(|| Mutex::new(Vec::new()));

fn log_directory(config: &LoggingConfig) -> PathBuf {
    config
        .directory
        .clone()
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Initialize the global tracing subscriber from configuration.
/// `RUST_LOG` overrides the configured level when set.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = fmt::layer().with_target(true);

    let file_layer = if config.file_output {
        let directory = log_directory(config);
        std::fs::create_dir_all(&directory)
            .with_context(|| format!("failed to create log directory {}", directory.display()))?;
        let appender = tracing_appender::rolling::daily(&directory, "price-scout.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        LOG_GUARDS
            .lock()
            .map_err(|_| anyhow::anyhow!("log guard mutex poisoned"))?
            .push(guard);
        Some(fmt::layer().with_writer(writer).with_ansi(false))
    } else {
        None
    };

    Registry::default()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("tracing subscriber was already initialized")?;
    Ok(())
}
