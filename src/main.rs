//! quake-alert binary entrypoint.
//! Loads configuration, sets up logging, and runs the poll loop forever.
//!
//! Usage: `quake-alert [path/to/quake.toml]`

use std::path::PathBuf;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use quake_alert::config::AppConfig;
use quake_alert::AlertEngine;

/// Compact logs; `RUST_LOG` wins, otherwise `info` (or `debug` when the
/// config says so). HTTP client internals are capped at `warn`.
fn init_tracing(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{level},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn"))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    let explicit = std::env::args().nth(1).map(PathBuf::from);
    let cfg = AppConfig::load_default(explicit).context("loading configuration")?;

    init_tracing(cfg.debug);
    cfg.warn_invalid_homes();
    tracing::info!(
        subscribers = cfg.subscribers.len(),
        test_mode = cfg.test,
        "starting quake-alert"
    );

    let client = quake_alert::http_client(cfg.request_timeout()).context("building http client")?;
    AlertEngine::from_config(&cfg, client).run().await;

    Ok(())
}
