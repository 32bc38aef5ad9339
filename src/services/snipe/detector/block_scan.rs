// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::metrics::SnipeStats;
use crate::domain::constants::MAX_BLOCK_BACKFILL;
use crate::domain::types::TriggerSource;
use crate::services::snipe::detector::DetectionContext;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

/// One-way switch that wakes a dormant block scanner. Activation is idempotent.
#[derive(Debug, Default)]
pub struct BlockScanSwitch {
    active: AtomicBool,
    notify: Notify,
}

impl BlockScanSwitch {
    /// True only for the call that flipped the switch.
    pub fn activate(&self) -> bool {
        let flipped = !self.active.swap(true, Ordering::AcqRel);
        if flipped {
            self.notify.notify_waiters();
        }
        flipped
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub async fn wait_active(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_active() {
                return;
            }
            notified.await;
        }
    }
}

pub struct BlockScanDetector {
    ctx: DetectionContext,
    poll_interval: Duration,
    switch: Arc<BlockScanSwitch>,
}

impl BlockScanDetector {
    pub fn new(ctx: DetectionContext, poll_interval: Duration, switch: Arc<BlockScanSwitch>) -> Self {
        Self {
            ctx,
            poll_interval,
            switch,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = self.switch.wait_active() => {}
        }
        tracing::info!(target: "block_scan", interval_ms = self.poll_interval.as_millis() as u64, "Block scan active");

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut next: Option<u64> = None;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(target: "block_scan", "Cancelled; stopping block scan");
                    return;
                }
                _ = ticker.tick() => {}
            }

            let head = match self.ctx.ledger.block_number().await {
                Ok(h) => h,
                Err(e) => {
                    tracing::warn!(target: "block_scan", error = %e, "Head poll failed");
                    continue;
                }
            };

            let start = match next {
                None => head,
                Some(n) if n > head => continue,
                Some(n) => {
                    let oldest = head.saturating_sub(MAX_BLOCK_BACKFILL - 1);
                    if n < oldest {
                        tracing::warn!(
                            target: "block_scan",
                            skipped_from = n,
                            skipped_to = oldest - 1,
                            "Fell behind; skipping blocks beyond backfill limit"
                        );
                    }
                    n.max(oldest)
                }
            };

            for number in start..=head {
                if cancel.is_cancelled() {
                    return;
                }
                match self.scan_block(number).await {
                    BlockScan::Claimed => return,
                    BlockScan::Done => next = Some(number + 1),
                    // Retry this block on the next tick.
                    BlockScan::Unavailable => {
                        next = Some(number);
                        break;
                    }
                }
            }
        }
    }

    async fn scan_block(&self, number: u64) -> BlockScan {
        let txs = match self.ctx.ledger.block_transactions(number).await {
            Ok(Some(txs)) => txs,
            Ok(None) => {
                tracing::debug!(target: "block_scan", number, "Block not available yet");
                return BlockScan::Unavailable;
            }
            Err(e) => {
                tracing::warn!(target: "block_scan", number, error = %e, "Block fetch failed");
                return BlockScan::Unavailable;
            }
        };
        SnipeStats::bump(&self.ctx.stats().blocks_scanned);
        tracing::debug!(target: "block_scan", number, txs = txs.len(), "Scanning block");

        for tx in txs {
            if !self.ctx.targets_contract(&tx) || !self.ctx.seen.insert(tx.hash) {
                continue;
            }
            if self.ctx.inspect(&tx, TriggerSource::BlockScan) {
                return BlockScan::Claimed;
            }
        }
        BlockScan::Done
    }
}

enum BlockScan {
    Done,
    Unavailable,
    Claimed,
}
