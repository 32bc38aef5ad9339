// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::metrics::SnipeStats;
use crate::common::retry::retry_async;
use crate::common::time_utils::current_unix;
use crate::domain::error::AppError;
use crate::domain::types::{
    DeliveryPath, ExecutionOutcome, PurchaseIntent, ReceiptSummary, SubmissionAttempt,
    TriggerEvent,
};
use crate::infrastructure::network::gas::GasPolicy;
use crate::infrastructure::network::ledger::LedgerClient;
use crate::infrastructure::network::relay::{BundleRequest, RelayClient};
use crate::services::snipe::builder::{SignedPurchase, TxBuilder};
use alloy::primitives::{B256, U256};
use std::fmt;
use std::sync::Arc;
use tokio::time::{Duration, Instant, sleep};

const READ_ATTEMPTS: usize = 3;
const READ_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct SubmissionConfig {
    pub inclusion_window_blocks: u64,
    pub relay_settle_delay: Duration,
    pub relay_poll_interval: Duration,
    pub bundle_time_window_secs: u64,
    pub receipt_poll: Duration,
    pub public_confirm_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Building,
    PrivateRelaySubmit,
    PrivateRelayPoll,
    Fallback,
    PublicBroadcast,
    PublicConfirm,
    Success,
    Failed,
}

impl SubmissionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionState::Idle => "idle",
            SubmissionState::Building => "building",
            SubmissionState::PrivateRelaySubmit => "private_relay_submit",
            SubmissionState::PrivateRelayPoll => "private_relay_poll",
            SubmissionState::Fallback => "fallback",
            SubmissionState::PublicBroadcast => "public_broadcast",
            SubmissionState::PublicConfirm => "public_confirm",
            SubmissionState::Success => "success",
            SubmissionState::Failed => "failed",
        }
    }
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct SubmissionReport {
    pub outcome: ExecutionOutcome,
    pub winning_path: Option<DeliveryPath>,
    pub tx_hash: Option<B256>,
    pub attempts: Vec<SubmissionAttempt>,
    pub trace: Vec<SubmissionState>,
}

impl SubmissionReport {
    pub fn reached(&self, state: SubmissionState) -> bool {
        self.trace.contains(&state)
    }
}

/// How the private relay leg ended.
enum RelayLeg {
    Landed(ReceiptSummary),
    Reverted(ReceiptSummary),
    Fallback,
}

/// Ordered record of one run through the state machine.
#[derive(Default)]
struct Run {
    trace: Vec<SubmissionState>,
    attempts: Vec<SubmissionAttempt>,
}

impl Run {
    fn enter(&mut self, state: SubmissionState) {
        tracing::debug!(target: "submission", %state, "State transition");
        self.trace.push(state);
    }

    fn record(&mut self, signed: &SignedPurchase, target_block: u64, bundle_id: Option<String>, path: DeliveryPath) {
        self.attempts.push(SubmissionAttempt {
            built_tx: signed.raw.clone(),
            tx_hash: signed.tx_hash,
            nonce: signed.nonce,
            target_block,
            relay_bundle_id: bundle_id,
            delivery_path: path,
        });
    }

    fn succeed(mut self, path: DeliveryPath, receipt: ReceiptSummary) -> SubmissionReport {
        self.enter(SubmissionState::Success);
        tracing::info!(
            target: "submission",
            path = path.as_str(),
            tx_hash = %receipt.tx_hash,
            block = ?receipt.block_number,
            "Purchase landed"
        );
        SubmissionReport {
            outcome: ExecutionOutcome::Succeeded,
            winning_path: Some(path),
            tx_hash: Some(receipt.tx_hash),
            attempts: self.attempts,
            trace: self.trace,
        }
    }

    fn fail(mut self, tx_hash: Option<B256>, reason: &str) -> SubmissionReport {
        self.enter(SubmissionState::Failed);
        tracing::error!(target: "submission", ?tx_hash, reason, "Purchase failed");
        SubmissionReport {
            outcome: ExecutionOutcome::FailedExhausted,
            winning_path: None,
            tx_hash,
            attempts: self.attempts,
            trace: self.trace,
        }
    }
}

/// Private relay first, public broadcast as fallback. Runs once per claim.
pub struct SubmissionStrategy {
    ledger: Arc<dyn LedgerClient>,
    relay: Option<Arc<dyn RelayClient>>,
    gas: GasPolicy,
    builder: Arc<TxBuilder>,
    stats: Arc<SnipeStats>,
    config: SubmissionConfig,
}

impl SubmissionStrategy {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        relay: Option<Arc<dyn RelayClient>>,
        gas: GasPolicy,
        builder: Arc<TxBuilder>,
        stats: Arc<SnipeStats>,
        config: SubmissionConfig,
    ) -> Self {
        Self {
            ledger,
            relay,
            gas,
            builder,
            stats,
            config,
        }
    }

    pub async fn execute(&self, intent: &PurchaseIntent, event: &TriggerEvent) -> SubmissionReport {
        let mut run = Run::default();
        run.enter(SubmissionState::Idle);
        tracing::info!(
            target: "submission",
            source = %event.source,
            evidence = ?event.evidence,
            relay = self.relay.as_ref().map(|r| r.name().to_string()),
            "Starting submission"
        );

        run.enter(SubmissionState::Building);
        let first_path = if self.relay.is_some() {
            DeliveryPath::PrivateRelay
        } else {
            DeliveryPath::PublicBroadcast
        };
        let signed = match self.build(intent, first_path).await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(target: "submission", error = %e, "Build failed; nothing sent");
                return run.fail(None, "build failed");
            }
        };

        if let Some(relay) = &self.relay {
            match self.private_relay(relay.as_ref(), &signed, &mut run).await {
                RelayLeg::Landed(receipt) => return run.succeed(DeliveryPath::PrivateRelay, receipt),
                // Nonce consumed; a public copy could never land.
                RelayLeg::Reverted(receipt) => {
                    return run.fail(Some(receipt.tx_hash), "relay transaction reverted");
                }
                RelayLeg::Fallback => {}
            }
        }

        run.enter(SubmissionState::Fallback);
        let public = if self.relay.is_some() && !self.gas.paths_share_price() {
            let quote = self.gas.reprice(&signed.quote, DeliveryPath::PublicBroadcast);
            match self.builder.sign(intent, signed.nonce, &quote) {
                Ok(s) => {
                    tracing::info!(
                        target: "submission",
                        nonce = s.nonce,
                        gas_price = s.quote.gas_price,
                        tx_hash = %s.tx_hash,
                        "Re-signed for public broadcast with the same nonce"
                    );
                    s
                }
                Err(e) => {
                    tracing::warn!(target: "submission", error = %e, "Re-sign failed; broadcasting relay bytes");
                    signed.clone()
                }
            }
        } else {
            signed.clone()
        };

        // Hashes whose receipt settles the purchase, in the order they are checked.
        let mut watch = vec![(public.tx_hash, DeliveryPath::PublicBroadcast)];
        if self.relay.is_some() && signed.tx_hash != public.tx_hash {
            watch.push((signed.tx_hash, DeliveryPath::PrivateRelay));
        }

        run.enter(SubmissionState::PublicBroadcast);
        let target_block = match self.ledger.block_number().await {
            Ok(head) => head + 1,
            Err(_) => 0,
        };
        run.record(&public, target_block, None, DeliveryPath::PublicBroadcast);
        match self.ledger.send_raw_transaction(&public.raw).await {
            Ok(hash) => {
                SnipeStats::bump(&self.stats.public_broadcasts);
                tracing::info!(target: "submission", tx_hash = %hash, nonce = public.nonce, "Broadcast to public pool");
            }
            Err(e) => {
                tracing::warn!(target: "submission", error = %e, "Public broadcast rejected");
                // A late relay inclusion consumes the nonce and makes the send fail.
                if let Some((receipt, path)) = self.first_receipt(&watch[1..]).await {
                    return if receipt.success {
                        run.succeed(path, receipt)
                    } else {
                        run.fail(Some(receipt.tx_hash), "relay transaction reverted")
                    };
                }
                return run.fail(Some(public.tx_hash), "public broadcast rejected");
            }
        }

        run.enter(SubmissionState::PublicConfirm);
        match self.confirm(&watch).await {
            Some((receipt, path)) if receipt.success => run.succeed(path, receipt),
            Some((receipt, _)) => run.fail(Some(receipt.tx_hash), "transaction reverted"),
            None => run.fail(Some(public.tx_hash), "confirmation timed out"),
        }
    }

    async fn build(&self, intent: &PurchaseIntent, path: DeliveryPath) -> Result<SignedPurchase, AppError> {
        let from = self.builder.address();
        let ledger = self.ledger.clone();
        let nonce = retry_async(
            "eth_getTransactionCount",
            move |_| {
                let ledger = ledger.clone();
                async move { ledger.nonce(from).await }
            },
            READ_ATTEMPTS,
            READ_BACKOFF,
        )
        .await?;

        let calldata = TxBuilder::calldata(intent);
        let quote = self.gas.quote(from, intent, &calldata, path).await?;
        self.check_balance(intent, quote.gas_limit, quote.gas_price).await;

        let signed = self.builder.sign(intent, nonce, &quote)?;
        tracing::info!(
            target: "submission",
            from = %from,
            nonce,
            gas_limit = quote.gas_limit,
            gas_price = quote.gas_price,
            tx_hash = %signed.tx_hash,
            "Purchase signed"
        );
        Ok(signed)
    }

    async fn check_balance(&self, intent: &PurchaseIntent, gas_limit: u64, gas_price: u128) {
        let Ok(value) = intent.total_value() else {
            return;
        };
        let needed = value.saturating_add(U256::from(gas_limit).saturating_mul(U256::from(gas_price)));
        match self.ledger.balance(self.builder.address()).await {
            Ok(balance) if balance < needed => {
                tracing::warn!(target: "submission", %balance, %needed, "Wallet balance below value plus max gas cost");
            }
            Ok(balance) => {
                tracing::debug!(target: "submission", %balance, %needed, "Wallet balance ok");
            }
            Err(e) => {
                tracing::debug!(target: "submission", error = %e, "Balance read failed");
            }
        }
    }

    async fn private_relay(&self, relay: &dyn RelayClient, signed: &SignedPurchase, run: &mut Run) -> RelayLeg {
        run.enter(SubmissionState::PrivateRelaySubmit);
        let ledger = self.ledger.clone();
        let head = retry_async(
            "eth_blockNumber",
            move |_| {
                let ledger = ledger.clone();
                async move { ledger.block_number().await }
            },
            READ_ATTEMPTS,
            READ_BACKOFF,
        )
        .await;
        let head = match head {
            Ok(h) => h,
            Err(e) => {
                tracing::warn!(target: "submission", error = %e, "Head unknown; skipping relay");
                return RelayLeg::Fallback;
            }
        };

        let target = head + 1;
        let request = BundleRequest::single(
            &signed.raw,
            target,
            current_unix(),
            self.config.bundle_time_window_secs,
        );
        let bundle_id = match relay.submit_bundle(&request).await {
            Ok(id) => {
                SnipeStats::bump(&self.stats.relay_submissions);
                tracing::info!(target: "submission", relay = relay.name(), bundle = %id, target, "Bundle submitted");
                Some(id)
            }
            Err(e) => {
                SnipeStats::bump(&self.stats.relay_rejections);
                tracing::warn!(target: "submission", relay = relay.name(), error = %e, "Bundle rejected");
                None
            }
        };
        run.record(signed, target, bundle_id.clone(), DeliveryPath::PrivateRelay);
        let Some(bundle_id) = bundle_id else {
            return RelayLeg::Fallback;
        };

        run.enter(SubmissionState::PrivateRelayPoll);
        sleep(self.config.relay_settle_delay).await;

        let last = target.saturating_add(self.config.inclusion_window_blocks);
        for block in target..=last {
            if block > target {
                sleep(self.config.relay_poll_interval).await;
            }
            SnipeStats::bump(&self.stats.relay_status_queries);
            let stats = match relay.bundle_stats(&bundle_id, block).await {
                Ok(s) => s,
                Err(e) => {
                    tracing::debug!(target: "submission", block, error = %e, "Bundle stats query failed");
                    continue;
                }
            };
            if !stats.included {
                tracing::debug!(target: "submission", block, "Bundle not included");
                continue;
            }

            let hash = stats.tx_hashes.first().copied().unwrap_or(signed.tx_hash);
            match self.receipt_with_retry(hash).await {
                Some(r) if r.success => return RelayLeg::Landed(r),
                Some(r) => return RelayLeg::Reverted(r),
                None => {
                    tracing::warn!(target: "submission", block, %hash, "Relay reports inclusion but no receipt yet");
                }
            }
        }

        tracing::info!(
            target: "submission",
            from = target,
            to = last,
            "Bundle unresolved across inclusion window"
        );
        RelayLeg::Fallback
    }

    async fn receipt_with_retry(&self, hash: B256) -> Option<ReceiptSummary> {
        let ledger = self.ledger.clone();
        retry_async(
            "eth_getTransactionReceipt",
            move |_| {
                let ledger = ledger.clone();
                async move {
                    match ledger.transaction_receipt(hash).await {
                        Ok(Some(r)) => Ok(r),
                        Ok(None) => Err(AppError::Connection(format!("no receipt for {hash}"))),
                        Err(e) => Err(e),
                    }
                }
            },
            READ_ATTEMPTS,
            READ_BACKOFF,
        )
        .await
        .ok()
    }

    async fn first_receipt(&self, watch: &[(B256, DeliveryPath)]) -> Option<(ReceiptSummary, DeliveryPath)> {
        for (hash, path) in watch {
            match self.ledger.transaction_receipt(*hash).await {
                Ok(Some(r)) => return Some((r, *path)),
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(target: "submission", %hash, error = %e, "Receipt read failed");
                }
            }
        }
        None
    }

    async fn confirm(&self, watch: &[(B256, DeliveryPath)]) -> Option<(ReceiptSummary, DeliveryPath)> {
        let deadline = Instant::now() + self.config.public_confirm_timeout;
        loop {
            if let Some(found) = self.first_receipt(watch).await {
                return Some(found);
            }
            if Instant::now() + self.config.receipt_poll > deadline {
                return None;
            }
            sleep(self.config.receipt_poll).await;
        }
    }
}
