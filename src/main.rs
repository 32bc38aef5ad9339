// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use clap::Parser;
use oxidity_sniper::app::config::Settings;
use oxidity_sniper::app::logging::setup_logging;
use oxidity_sniper::common::metrics::{SnipeStats, spawn_metrics_server};
use oxidity_sniper::domain::error::AppError;
use oxidity_sniper::services::snipe::SnipeEngine;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about = "oxidity sniper")]
struct Cli {
    /// Path to config file (default: config.{toml,yaml,...})
    #[arg(long)]
    config: Option<String>,

    /// Metrics port (overrides config/env)
    #[arg(long)]
    metrics_port: Option<u16>,

    /// JSON log lines instead of compact text
    #[arg(long, default_value_t = false)]
    log_json: bool,

    /// Debug logging (overrides config/env)
    #[arg(long, default_value_t = false)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    let mut settings = Settings::load_with_path(cli.config.as_deref())?;
    if cli.debug {
        settings.debug = true;
    }
    if cli.log_json {
        settings.log_json = true;
    }
    if cli.metrics_port.is_some() {
        settings.metrics_port = cli.metrics_port;
    }
    setup_logging(if settings.debug { "debug" } else { "info" }, settings.log_json);

    let shutdown = CancellationToken::new();
    let stats = Arc::new(SnipeStats::default());
    let engine = SnipeEngine::from_settings(&settings, stats.clone()).await?;

    if let Some(port) = settings.metrics_port {
        spawn_metrics_server(port, stats.clone(), shutdown.clone()).await;
    }

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!(target: "engine", "Interrupt received; shutting down");
                shutdown.cancel();
            }
        });
    }

    let report = engine.run(shutdown.clone()).await;
    shutdown.cancel();
    stats.log_summary();

    let report = report?;
    tracing::info!(
        target: "engine",
        outcome = ?report.outcome,
        trigger = ?report.trigger.as_ref().map(|t| t.source.as_str()),
        attempts = report.submission.as_ref().map(|s| s.attempts.len()).unwrap_or(0),
        "Done"
    );
    Ok(())
}
