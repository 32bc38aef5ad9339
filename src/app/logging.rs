// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use std::str::FromStr;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Transport crates that flood the output at debug.
const QUIET_MODULES: [&str; 7] = [
    "h2=info",
    "hyper=info",
    "hyper_util=info",
    "reqwest=info",
    "tokio_tungstenite=info",
    "alloy_transport_http=info",
    "alloy_pubsub=info",
];

/// Bare levels ("debug") get the quiet-module defaults appended; full directive
/// strings (anything with ',' or '=') pass through untouched.
fn filter_spec(log_level: &str) -> String {
    let normalized = log_level.trim();
    if normalized.is_empty() {
        return "info".to_string();
    }
    if normalized.contains(',') || normalized.contains('=') {
        return normalized.to_string();
    }
    format!("{normalized},{}", QUIET_MODULES.join(","))
}

pub fn setup_logging(log_level: &str, json_format: bool) {
    let filter_spec = filter_spec(log_level);
    let filter = EnvFilter::from_str(&filter_spec).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry().with(filter);

    // try_init: tests and embedders may already have installed a subscriber.
    let installed = if json_format {
        let json_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(false);
        subscriber.with(json_layer).try_init().is_ok()
    } else {
        let fmt_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .compact();
        subscriber.with(fmt_layer).try_init().is_ok()
    };

    if installed {
        let base = filter_spec.split(',').next().unwrap_or("info");
        tracing::info!(
            base,
            format = if json_format { "json" } else { "compact" },
            "Logging initialized"
        );
    }
}
