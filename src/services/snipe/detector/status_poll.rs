// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::common::metrics::SnipeStats;
use crate::domain::types::{StatusPollMode, TriggerEvent, TriggerSource};
use crate::infrastructure::data::abi::decode_status_return;
use crate::services::snipe::detector::DetectionContext;
use alloy::primitives::Bytes;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

/// Periodic read-only call of the sale's status view.
pub struct StatusPollDetector {
    ctx: DetectionContext,
    calldata: Bytes,
    poll_interval: Duration,
    mode: StatusPollMode,
}

impl StatusPollDetector {
    pub fn new(
        ctx: DetectionContext,
        calldata: Bytes,
        poll_interval: Duration,
        mode: StatusPollMode,
    ) -> Self {
        Self {
            ctx,
            calldata,
            poll_interval,
            mode,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        // First tick fires immediately.
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut waiting_logged = false;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(target: "status_poll", "Cancelled; stopping status poll");
                    return;
                }
                _ = ticker.tick() => {}
            }

            if self.mode == StatusPollMode::AfterSuspicion && !self.ctx.suspicion.is_raised() {
                if !waiting_logged {
                    tracing::debug!(target: "status_poll", "Waiting for a gating call before polling");
                    waiting_logged = true;
                }
                continue;
            }

            SnipeStats::bump(&self.ctx.stats().status_polls);
            let active = match self
                .ctx
                .ledger
                .call(self.ctx.contract, self.calldata.clone())
                .await
            {
                Ok(raw) => decode_status_return(&raw),
                Err(e) => Err(e),
            };

            match active {
                Ok(true) => {
                    tracing::info!(target: "status_poll", contract = %self.ctx.contract, "Sale reports active");
                    if self.ctx.sink.report(TriggerEvent::now(TriggerSource::StatusPoll, None))
                        || self.ctx.sink.is_attempted()
                    {
                        return;
                    }
                }
                Ok(false) => {
                    tracing::trace!(target: "status_poll", "Sale not active yet");
                }
                Err(e) => {
                    tracing::debug!(target: "status_poll", error = %e, "Status read failed");
                }
            }
        }
    }
}
