// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

pub mod block_scan;
pub mod status_poll;
pub mod subscription;

pub use block_scan::{BlockScanDetector, BlockScanSwitch};
pub use status_poll::StatusPollDetector;
pub use subscription::{SubscriptionDetector, SubscriptionExit};

use crate::common::metrics::SnipeStats;
use crate::common::seen_cache::DeduplicationSet;
use crate::domain::types::{ObservedTx, TriggerEvent, TriggerSource};
use crate::infrastructure::network::ledger::LedgerClient;
use crate::services::snipe::guard::TriggerSink;
use crate::services::snipe::recognition::{Classification, RecognitionTable};
use alloy::primitives::Address;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Raised the first time any gating selector is seen in a phase.
#[derive(Debug, Default)]
pub struct Suspicion(AtomicBool);

impl Suspicion {
    pub fn raise(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Everything a detector of one phase shares with its siblings.
#[derive(Clone)]
pub struct DetectionContext {
    pub ledger: Arc<dyn LedgerClient>,
    pub table: Arc<RecognitionTable>,
    pub seen: Arc<DeduplicationSet>,
    pub suspicion: Arc<Suspicion>,
    pub sink: TriggerSink,
    pub contract: Address,
}

impl DetectionContext {
    pub fn stats(&self) -> &Arc<SnipeStats> {
        self.sink.stats()
    }

    pub fn targets_contract(&self, tx: &ObservedTx) -> bool {
        tx.to == Some(self.contract)
    }

    /// Filter, classify and report one transaction. True when it won the claim.
    pub fn inspect(&self, tx: &ObservedTx, source: TriggerSource) -> bool {
        if !self.targets_contract(tx) {
            return false;
        }
        let class = self.table.classify(&tx.input);
        if !class.is_gating() {
            return false;
        }

        SnipeStats::bump(&self.stats().gating_calls_seen);
        if self.suspicion.raise() {
            tracing::info!(target: "detector", %source, hash = %tx.hash, "Gating selector observed; suspicion raised");
        }

        match class {
            Classification::Activate { heuristic } => {
                tracing::info!(
                    target: "detector",
                    %source,
                    hash = %tx.hash,
                    heuristic,
                    "Gating call activates sale"
                );
                self.sink.report(TriggerEvent::now(source, Some(tx.hash)))
            }
            Classification::Deactivate => {
                tracing::info!(target: "detector", %source, hash = %tx.hash, "Gating call disables sale; ignoring");
                false
            }
            Classification::Ambiguous => {
                tracing::warn!(
                    target: "detector",
                    %source,
                    hash = %tx.hash,
                    input = %tx.input,
                    "Gating call argument unreadable; not a trigger"
                );
                false
            }
            Classification::NotGating => false,
        }
    }
}
