// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::metrics::SnipeStats;
use crate::domain::types::TriggerSource;
use crate::services::snipe::detector::DetectionContext;
use alloy::primitives::B256;
use futures::StreamExt;
use futures::future;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionExit {
    Cancelled,
    /// The feed closed its stream; the transport is gone.
    StreamEnded,
    Claimed,
}

/// Consumes one session's pending hashes. A fresh instance per session.
pub struct SubscriptionDetector {
    ctx: DetectionContext,
    fetch_concurrency: usize,
}

impl SubscriptionDetector {
    pub fn new(ctx: DetectionContext, fetch_concurrency: usize) -> Self {
        Self {
            ctx,
            fetch_concurrency: fetch_concurrency.max(1),
        }
    }

    pub async fn run(
        self,
        hashes: BoxStream<'static, B256>,
        cancel: CancellationToken,
    ) -> SubscriptionExit {
        let seen = self.ctx.seen.clone();
        let stats = self.ctx.stats().clone();
        let ledger = self.ctx.ledger.clone();

        let fetches = hashes
            .inspect(move |_| SnipeStats::bump(&stats.pending_hashes_seen))
            .filter(move |hash| future::ready(seen.insert(*hash)))
            .map(move |hash| {
                let ledger = ledger.clone();
                async move { (hash, ledger.transaction_by_hash(hash).await) }
            })
            .buffer_unordered(self.fetch_concurrency);
        tokio::pin!(fetches);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(target: "subscription", "Cancelled; leaving pending stream");
                    return SubscriptionExit::Cancelled;
                }
                next = fetches.next() => match next {
                    Some((_, Ok(Some(tx)))) => {
                        SnipeStats::bump(&self.ctx.stats().txs_fetched);
                        if self.ctx.inspect(&tx, TriggerSource::Subscription) {
                            return SubscriptionExit::Claimed;
                        }
                    }
                    Some((hash, Ok(None))) => {
                        // Not propagated to our node yet; let the block scan have it.
                        self.ctx.seen.forget(&hash);
                    }
                    Some((hash, Err(e))) => {
                        self.ctx.seen.forget(&hash);
                        tracing::debug!(
                            target: "subscription",
                            %hash,
                            error = %e,
                            "Failed to fetch pending tx by hash"
                        );
                    }
                    None => {
                        tracing::warn!(target: "subscription", "Pending hash stream ended");
                        return SubscriptionExit::StreamEnded;
                    }
                }
            }
        }
    }
}
