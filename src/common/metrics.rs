// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Process-wide counters. Cheap to bump from any detector task.
#[derive(Debug, Default)]
pub struct SnipeStats {
    pub pending_hashes_seen: AtomicU64,
    pub txs_fetched: AtomicU64,
    pub gating_calls_seen: AtomicU64,
    pub triggers_reported: AtomicU64,
    pub claims_rejected: AtomicU64,
    pub heartbeat_failures: AtomicU64,
    pub reconnects: AtomicU64,
    pub phase_restarts: AtomicU64,
    pub blocks_scanned: AtomicU64,
    pub status_polls: AtomicU64,
    pub relay_submissions: AtomicU64,
    pub relay_rejections: AtomicU64,
    pub relay_status_queries: AtomicU64,
    pub public_broadcasts: AtomicU64,
}

impl SnipeStats {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> Vec<(&'static str, u64)> {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        vec![
            ("snipe_pending_hashes_seen", load(&self.pending_hashes_seen)),
            ("snipe_txs_fetched", load(&self.txs_fetched)),
            ("snipe_gating_calls_seen", load(&self.gating_calls_seen)),
            ("snipe_triggers_reported", load(&self.triggers_reported)),
            ("snipe_claims_rejected", load(&self.claims_rejected)),
            ("snipe_heartbeat_failures", load(&self.heartbeat_failures)),
            ("snipe_reconnects", load(&self.reconnects)),
            ("snipe_phase_restarts", load(&self.phase_restarts)),
            ("snipe_blocks_scanned", load(&self.blocks_scanned)),
            ("snipe_status_polls", load(&self.status_polls)),
            ("snipe_relay_submissions", load(&self.relay_submissions)),
            ("snipe_relay_rejections", load(&self.relay_rejections)),
            ("snipe_relay_status_queries", load(&self.relay_status_queries)),
            ("snipe_public_broadcasts", load(&self.public_broadcasts)),
        ]
    }

    pub fn log_summary(&self) {
        let summary = self
            .snapshot()
            .into_iter()
            .filter(|(_, v)| *v > 0)
            .map(|(k, v)| format!("{}={v}", k.trim_start_matches("snipe_")))
            .collect::<Vec<_>>()
            .join(" ");
        tracing::info!(target: "metrics", summary = %summary, "Session counters");
    }
}

pub async fn spawn_metrics_server(
    port: u16,
    stats: Arc<SnipeStats>,
    shutdown: CancellationToken,
) -> Option<SocketAddr> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::warn!(target: "metrics", error = %e, "Metrics server failed to bind");
            return None;
        }
    };

    let local = listener.local_addr().ok();
    if let Some(addr) = local {
        tracing::info!(target: "metrics", %addr, "Metrics server listening");
    }

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((mut socket, _)) => {
                        let body = render_metrics(&stats);
                        let response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n{}",
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                    }
                    Err(e) => {
                        tracing::warn!(target: "metrics", error = %e, "Metrics accept error");
                    }
                }
            }
        }
    });

    local
}

fn render_metrics(stats: &SnipeStats) -> String {
    let mut body = String::new();
    for (name, value) in stats.snapshot() {
        body.push_str(&format!("# TYPE {name} counter\n{name} {value}\n"));
    }
    body
}
