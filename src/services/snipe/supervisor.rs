// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::common::metrics::SnipeStats;
use crate::common::seen_cache::DeduplicationSet;
use crate::domain::error::AppError;
use crate::domain::types::StatusPollMode;
use crate::infrastructure::network::ingest::mempool::{Liveness, PendingFeed, PendingSession};
use crate::infrastructure::network::ledger::LedgerClient;
use crate::services::snipe::detector::{
    BlockScanDetector, BlockScanSwitch, DetectionContext, StatusPollDetector, SubscriptionDetector,
    SubscriptionExit, Suspicion,
};
use crate::services::snipe::guard::TriggerSink;
use crate::services::snipe::recognition::RecognitionTable;
use alloy::primitives::{Address, Bytes};
use futures::StreamExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::task::JoinSet;
use tokio::time::{Duration, Instant, MissedTickBehavior, interval_at, sleep};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub subscription_warmup: Duration,
    pub heartbeat_interval: Duration,
    pub reconnect_backoff: Vec<Duration>,
    pub restart_delay: Duration,
    pub block_poll_interval: Duration,
    pub status_poll_interval: Duration,
    pub status_poll_mode: StatusPollMode,
    pub fetch_concurrency: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PhaseEnd {
    Cancelled,
    TransportExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Cancelled,
    Lost { healthy: bool },
}

/// Owns every detector and the pending-subscription lifecycle.
///
/// A phase is one dedup set, one status poller, one dormant block scanner and a
/// run of subscription sessions. Exhausting the reconnect schedule ends the
/// phase; a new one starts after `restart_delay` unless execution was claimed.
pub struct ConnectionSupervisor {
    ledger: Arc<dyn LedgerClient>,
    feed: Option<Arc<dyn PendingFeed>>,
    table: Arc<RecognitionTable>,
    contract: Address,
    status_calldata: Bytes,
    sink: TriggerSink,
    config: SupervisorConfig,
}

impl ConnectionSupervisor {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        feed: Option<Arc<dyn PendingFeed>>,
        table: Arc<RecognitionTable>,
        contract: Address,
        status_calldata: Bytes,
        sink: TriggerSink,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            ledger,
            feed,
            table,
            contract,
            status_calldata,
            sink,
            config,
        }
    }

    fn stats(&self) -> &Arc<SnipeStats> {
        self.sink.stats()
    }

    pub async fn run(self, detection: CancellationToken) {
        let mut phase_no = 0u64;
        loop {
            if detection.is_cancelled() || self.sink.is_attempted() {
                break;
            }
            phase_no += 1;
            let phase = detection.child_token();
            tracing::info!(target: "supervisor", phase = phase_no, "Detection phase starting");

            let end = self.run_phase(phase_no, phase.clone()).await;
            phase.cancel();

            match end {
                PhaseEnd::Cancelled => break,
                PhaseEnd::TransportExhausted => {
                    SnipeStats::bump(&self.stats().phase_restarts);
                    tracing::warn!(
                        target: "supervisor",
                        phase = phase_no,
                        delay_ms = self.config.restart_delay.as_millis() as u64,
                        "Reconnect schedule exhausted; restarting detection"
                    );
                    tokio::select! {
                        _ = detection.cancelled() => break,
                        _ = sleep(self.config.restart_delay) => {}
                    }
                }
            }
        }
        tracing::info!(target: "supervisor", phases = phase_no, "Supervisor stopped");
    }

    async fn run_phase(&self, phase_no: u64, phase: CancellationToken) -> PhaseEnd {
        let ctx = DetectionContext {
            ledger: self.ledger.clone(),
            table: self.table.clone(),
            seen: Arc::new(DeduplicationSet::new()),
            suspicion: Arc::new(Suspicion::default()),
            sink: self.sink.clone(),
            contract: self.contract,
        };
        let switch = Arc::new(BlockScanSwitch::default());
        let mut tasks = JoinSet::new();

        tasks.spawn(
            StatusPollDetector::new(
                ctx.clone(),
                self.status_calldata.clone(),
                self.config.status_poll_interval,
                self.config.status_poll_mode,
            )
            .run(phase.clone()),
        );
        tasks.spawn(
            BlockScanDetector::new(ctx.clone(), self.config.block_poll_interval, switch.clone())
                .run(phase.clone()),
        );

        let end = match &self.feed {
            None => {
                switch.activate();
                tracing::info!(target: "supervisor", phase = phase_no, "No websocket endpoint; block scan active from start");
                phase.cancelled().await;
                PhaseEnd::Cancelled
            }
            Some(feed) => {
                let hash_seen = Arc::new(AtomicBool::new(false));
                tasks.spawn(warmup_watch(
                    self.config.subscription_warmup,
                    hash_seen.clone(),
                    switch.clone(),
                    phase.clone(),
                ));
                self.subscription_loop(feed.as_ref(), &ctx, &switch, &hash_seen, &phase)
                    .await
            }
        };

        phase.cancel();
        while let Some(res) = tasks.join_next().await {
            if let Err(e) = res {
                tracing::warn!(target: "supervisor", error = %e, "Detector task failed");
            }
        }
        tracing::debug!(
            target: "supervisor",
            phase = phase_no,
            seen = ctx.seen.len(),
            block_scan = switch.is_active(),
            "Phase torn down"
        );
        end
    }

    async fn subscription_loop(
        &self,
        feed: &dyn PendingFeed,
        ctx: &DetectionContext,
        switch: &BlockScanSwitch,
        hash_seen: &Arc<AtomicBool>,
        phase: &CancellationToken,
    ) -> PhaseEnd {
        let mut backoff_idx = 0usize;
        loop {
            let opened = tokio::select! {
                _ = phase.cancelled() => return PhaseEnd::Cancelled,
                opened = feed.open() => opened,
            };

            match opened {
                Ok(session) => match self.run_session(session, ctx, hash_seen, phase).await {
                    SessionEnd::Cancelled => return PhaseEnd::Cancelled,
                    SessionEnd::Lost { healthy } => {
                        if healthy {
                            backoff_idx = 0;
                        }
                    }
                },
                Err(e) => {
                    tracing::warn!(target: "supervisor", error = %e, "Pending subscription unavailable");
                    if switch.activate() {
                        tracing::info!(target: "supervisor", "Block scan activated as subscription fallback");
                    }
                }
            }

            let Some(delay) = self.config.reconnect_backoff.get(backoff_idx).copied() else {
                return PhaseEnd::TransportExhausted;
            };
            backoff_idx += 1;
            SnipeStats::bump(&self.stats().reconnects);
            tracing::info!(
                target: "supervisor",
                attempt = backoff_idx,
                delay_ms = delay.as_millis() as u64,
                "Reconnecting pending subscription"
            );
            tokio::select! {
                _ = phase.cancelled() => return PhaseEnd::Cancelled,
                _ = sleep(delay) => {}
            }
        }
    }

    /// Runs one session to its end. The session (stream and transport) is
    /// dropped on return, whichever branch ends it.
    async fn run_session(
        &self,
        session: PendingSession,
        ctx: &DetectionContext,
        hash_seen: &Arc<AtomicBool>,
        phase: &CancellationToken,
    ) -> SessionEnd {
        let PendingSession { hashes, liveness } = session;
        let session_token = phase.child_token();
        let flag = hash_seen.clone();
        let hashes = hashes
            .inspect(move |_| flag.store(true, Ordering::Relaxed))
            .boxed();

        let probes_ok = AtomicU64::new(0);
        let detector = SubscriptionDetector::new(ctx.clone(), self.config.fetch_concurrency);
        let run = detector.run(hashes, session_token.clone());
        let beat = heartbeat(liveness.as_ref(), self.config.heartbeat_interval, &probes_ok);
        tokio::pin!(run);
        tokio::pin!(beat);

        let end = tokio::select! {
            exit = &mut run => match exit {
                SubscriptionExit::Cancelled | SubscriptionExit::Claimed => SessionEnd::Cancelled,
                SubscriptionExit::StreamEnded => SessionEnd::Lost {
                    healthy: probes_ok.load(Ordering::Relaxed) > 0,
                },
            },
            err = &mut beat => {
                SnipeStats::bump(&self.stats().heartbeat_failures);
                tracing::warn!(target: "supervisor", error = %err, "Heartbeat failed; dropping session");
                SessionEnd::Lost {
                    healthy: probes_ok.load(Ordering::Relaxed) > 0,
                }
            }
        };
        session_token.cancel();
        if phase.is_cancelled() {
            return SessionEnd::Cancelled;
        }
        end
    }
}

/// Probes every `every` until a probe fails.
async fn heartbeat(liveness: &dyn Liveness, every: Duration, probes_ok: &AtomicU64) -> AppError {
    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        match tokio::time::timeout(every, liveness.probe()).await {
            Ok(Ok(head)) => {
                probes_ok.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(target: "supervisor", head, "Heartbeat ok");
            }
            Ok(Err(e)) => return e,
            Err(_) => return AppError::Transport("Heartbeat timed out".into()),
        }
    }
}

async fn warmup_watch(
    warmup: Duration,
    hash_seen: Arc<AtomicBool>,
    switch: Arc<BlockScanSwitch>,
    phase: CancellationToken,
) {
    tokio::select! {
        _ = phase.cancelled() => {}
        _ = sleep(warmup) => {
            if !hash_seen.load(Ordering::Relaxed) && switch.activate() {
                tracing::warn!(
                    target: "supervisor",
                    warmup_ms = warmup.as_millis() as u64,
                    "No pending hashes during warm-up; block scan activated"
                );
            }
        }
    }
}
