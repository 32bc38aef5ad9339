// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::common::metrics::SnipeStats;
use crate::domain::types::{ExecutionOutcome, TriggerEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Single-shot execution latch shared by every detector.
///
/// `attempted` only ever goes false -> true, through one compare-and-set.
#[derive(Debug)]
pub struct ExecutionGuard {
    attempted: AtomicBool,
    winner: OnceLock<TriggerEvent>,
    outcome: Mutex<ExecutionOutcome>,
}

impl Default for ExecutionGuard {
    fn default() -> Self {
        Self {
            attempted: AtomicBool::new(false),
            winner: OnceLock::new(),
            outcome: Mutex::new(ExecutionOutcome::Pending),
        }
    }
}

impl ExecutionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// True for exactly one caller over the guard's lifetime.
    pub fn try_claim(&self, event: &TriggerEvent) -> bool {
        if self
            .attempted
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        let _ = self.winner.set(event.clone());
        tracing::info!(
            target: "guard",
            source = %event.source,
            evidence = ?event.evidence,
            observed_at = %event.observed_at,
            "Execution claimed"
        );
        true
    }

    pub fn is_attempted(&self) -> bool {
        self.attempted.load(Ordering::Acquire)
    }

    pub fn winning_event(&self) -> Option<&TriggerEvent> {
        self.winner.get()
    }

    pub fn record_outcome(&self, outcome: ExecutionOutcome) {
        let mut current = self.outcome.lock().unwrap_or_else(|e| e.into_inner());
        if current.is_terminal() {
            tracing::warn!(target: "guard", ?current, ?outcome, "Outcome already recorded");
            return;
        }
        *current = outcome;
        tracing::info!(target: "guard", ?outcome, "Execution outcome recorded");
    }

    pub fn outcome(&self) -> ExecutionOutcome {
        *self.outcome.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Receiving end of the single claimed event.
pub type ClaimReceiver = mpsc::Receiver<TriggerEvent>;

/// The one funnel detectors report positive observations through.
///
/// The winner forwards its event to the engine and cancels detection; cancel is
/// a non-blocking token flip so it is safe from inside any detector task.
#[derive(Clone)]
pub struct TriggerSink {
    guard: Arc<ExecutionGuard>,
    claims: mpsc::Sender<TriggerEvent>,
    detection: CancellationToken,
    stats: Arc<SnipeStats>,
}

impl TriggerSink {
    pub fn new(
        guard: Arc<ExecutionGuard>,
        detection: CancellationToken,
        stats: Arc<SnipeStats>,
    ) -> (Self, ClaimReceiver) {
        let (claims, rx) = mpsc::channel(1);
        (
            Self {
                guard,
                claims,
                detection,
                stats,
            },
            rx,
        )
    }

    pub fn report(&self, event: TriggerEvent) -> bool {
        SnipeStats::bump(&self.stats.triggers_reported);
        if !self.guard.try_claim(&event) {
            SnipeStats::bump(&self.stats.claims_rejected);
            tracing::debug!(
                target: "guard",
                source = %event.source,
                evidence = ?event.evidence,
                "Claim rejected; execution already attempted"
            );
            return false;
        }
        // Capacity 1 and a single winner: this cannot be full.
        if let Err(e) = self.claims.try_send(event) {
            tracing::error!(target: "guard", error = %e, "Claimed event could not reach the engine");
        }
        self.detection.cancel();
        true
    }

    pub fn is_attempted(&self) -> bool {
        self.guard.is_attempted()
    }

    pub fn detection(&self) -> &CancellationToken {
        &self.detection
    }

    pub fn stats(&self) -> &Arc<SnipeStats> {
        &self.stats
    }
}
