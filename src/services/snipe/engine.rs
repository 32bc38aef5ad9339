// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::app::config::Settings;
use crate::common::metrics::SnipeStats;
use crate::domain::error::AppError;
use crate::domain::types::{ExecutionOutcome, PurchaseIntent, TriggerEvent};
use crate::infrastructure::network::gas::{GasPolicy, GasPolicyConfig};
use crate::infrastructure::network::ingest::mempool::{PendingFeed, WsPendingFeed};
use crate::infrastructure::network::ledger::{AlloyLedger, LedgerClient};
use crate::infrastructure::network::provider::ConnectionFactory;
use crate::infrastructure::network::relay::{FlashbotsRelay, RelayAuth, RelayClient};
use crate::services::snipe::builder::TxBuilder;
use crate::services::snipe::guard::{ExecutionGuard, TriggerSink};
use crate::services::snipe::recognition::RecognitionTable;
use crate::services::snipe::submission::{SubmissionConfig, SubmissionReport, SubmissionStrategy};
use crate::services::snipe::supervisor::{ConnectionSupervisor, SupervisorConfig};
use alloy::primitives::Bytes;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything the engine needs, already connected.
pub struct EngineParts {
    pub ledger: Arc<dyn LedgerClient>,
    pub feed: Option<Arc<dyn PendingFeed>>,
    pub relay: Option<Arc<dyn RelayClient>>,
    pub builder: Arc<TxBuilder>,
    pub intent: PurchaseIntent,
    pub table: RecognitionTable,
    pub status_calldata: Bytes,
    pub gas: GasPolicyConfig,
    pub supervisor: SupervisorConfig,
    pub submission: SubmissionConfig,
    pub stats: Arc<SnipeStats>,
}

#[derive(Debug, Clone)]
pub struct EngineReport {
    pub outcome: ExecutionOutcome,
    pub trigger: Option<TriggerEvent>,
    /// `None` when no trigger was claimed or the submission was interrupted.
    pub submission: Option<SubmissionReport>,
}

pub struct SnipeEngine {
    ledger: Arc<dyn LedgerClient>,
    feed: Option<Arc<dyn PendingFeed>>,
    relay: Option<Arc<dyn RelayClient>>,
    builder: Arc<TxBuilder>,
    intent: PurchaseIntent,
    table: Arc<RecognitionTable>,
    status_calldata: Bytes,
    gas: GasPolicyConfig,
    supervisor: SupervisorConfig,
    submission: SubmissionConfig,
    stats: Arc<SnipeStats>,
    guard: Arc<ExecutionGuard>,
}

impl SnipeEngine {
    pub fn new(parts: EngineParts) -> Self {
        Self {
            ledger: parts.ledger,
            feed: parts.feed,
            relay: parts.relay,
            builder: parts.builder,
            intent: parts.intent,
            table: Arc::new(parts.table),
            status_calldata: parts.status_calldata,
            gas: parts.gas,
            supervisor: parts.supervisor,
            submission: parts.submission,
            stats: parts.stats,
            guard: Arc::new(ExecutionGuard::new()),
        }
    }

    /// Connects the alloy ledger, websocket feed and Flashbots relay described by `settings`.
    pub async fn from_settings(settings: &Settings, stats: Arc<SnipeStats>) -> Result<Self, AppError> {
        let intent = settings.purchase_intent()?;
        let wallet = settings.wallet_signer()?;
        let http = ConnectionFactory::http(&settings.http_provider)?;
        let chain_id = match settings.chain_id {
            Some(id) => id,
            None => ConnectionFactory::detect_chain_id(&http).await?,
        };

        let feed = settings
            .websocket_provider_value()
            .map(|url| Arc::new(WsPendingFeed::new(url)) as Arc<dyn PendingFeed>);
        let relay = if settings.relay_enabled {
            let auth = RelayAuth::new(settings.bundle_signer()?);
            tracing::info!(target: "engine", signer = %auth.address(), url = %settings.flashbots_relay_url(), "Private relay enabled");
            Some(Arc::new(FlashbotsRelay::new(settings.flashbots_relay_url(), auth)?) as Arc<dyn RelayClient>)
        } else {
            None
        };

        let table = RecognitionTable::from_config(
            &settings.gating_signatures,
            &settings.gating_selector_values()?,
        )?;
        tracing::info!(
            target: "engine",
            chain_id,
            wallet = %wallet.address(),
            contract = %intent.contract_address,
            amount = intent.amount,
            unit_price = %intent.unit_price,
            gating_variants = table.variants().len(),
            websocket = feed.is_some(),
            relay = relay.is_some(),
            "Engine configured"
        );

        Ok(Self::new(EngineParts {
            ledger: Arc::new(AlloyLedger::new(http)),
            feed,
            relay,
            builder: Arc::new(TxBuilder::new(wallet, chain_id)),
            intent,
            table,
            status_calldata: Bytes::copy_from_slice(settings.status_selector()?.as_slice()),
            gas: GasPolicyConfig {
                base_gas: settings.base_gas,
                per_unit_gas: settings.per_unit_gas,
                safety_multiplier_bps: settings.gas_safety_multiplier_bps_value(),
                fallback_estimate: settings.fallback_gas_estimate,
                relay_escalation_bps: settings.relay_gas_escalation_bps,
                public_escalation_bps: settings.public_gas_escalation_bps,
            },
            supervisor: SupervisorConfig {
                subscription_warmup: settings.subscription_warmup(),
                heartbeat_interval: settings.heartbeat_interval(),
                reconnect_backoff: settings.reconnect_backoff(),
                restart_delay: settings.restart_delay(),
                block_poll_interval: settings.block_poll_interval(),
                status_poll_interval: settings.status_poll_interval(),
                status_poll_mode: settings.status_poll_mode_value()?,
                fetch_concurrency: settings.fetch_concurrency_value(),
            },
            submission: SubmissionConfig {
                inclusion_window_blocks: settings.inclusion_window_blocks_value(),
                relay_settle_delay: settings.relay_settle_delay(),
                relay_poll_interval: settings.relay_poll_interval(),
                bundle_time_window_secs: settings.bundle_time_window_secs_value(),
                receipt_poll: settings.receipt_poll(),
                public_confirm_timeout: settings.public_confirm_timeout(),
            },
            stats,
        }))
    }

    pub fn guard(&self) -> &Arc<ExecutionGuard> {
        &self.guard
    }

    pub fn stats(&self) -> &Arc<SnipeStats> {
        &self.stats
    }

    /// Detect, claim once, submit, tear down. Cancelling `shutdown` stops every stage.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<EngineReport, AppError> {
        let detection = shutdown.child_token();
        let (sink, mut claims) =
            TriggerSink::new(self.guard.clone(), detection.clone(), self.stats.clone());

        let supervisor = ConnectionSupervisor::new(
            self.ledger.clone(),
            self.feed.clone(),
            self.table.clone(),
            self.intent.contract_address,
            self.status_calldata.clone(),
            sink,
            self.supervisor.clone(),
        );
        let supervisor = tokio::spawn(supervisor.run(detection.clone()));
        tracing::info!(target: "engine", contract = %self.intent.contract_address, "Watching for sale activation");

        let claim = tokio::select! {
            biased;
            claim = claims.recv() => claim,
            // The winner sends before it cancels; pick up a claim that raced the cancel.
            _ = detection.cancelled() => claims.try_recv().ok(),
        };

        let mut submission = None;
        match &claim {
            Some(event) => {
                let strategy = SubmissionStrategy::new(
                    self.ledger.clone(),
                    self.relay.clone(),
                    GasPolicy::new(self.ledger.clone(), self.gas),
                    self.builder.clone(),
                    self.stats.clone(),
                    self.submission.clone(),
                );
                tokio::select! {
                    report = strategy.execute(&self.intent, event) => {
                        self.guard.record_outcome(report.outcome);
                        submission = Some(report);
                    }
                    _ = shutdown.cancelled() => {
                        tracing::warn!(target: "engine", "Interrupted during submission; outcome stays pending");
                    }
                }
            }
            None => {
                tracing::info!(target: "engine", "Detection ended without a claim");
            }
        }

        detection.cancel();
        if let Err(e) = supervisor.await {
            return Err(AppError::Initialization(format!("Supervisor task failed: {e}")));
        }

        let report = EngineReport {
            outcome: self.guard.outcome(),
            trigger: claim,
            submission,
        };
        tracing::info!(
            target: "engine",
            outcome = ?report.outcome,
            path = report.submission.as_ref().and_then(|s| s.winning_path).map(|p| p.as_str()),
            tx_hash = ?report.submission.as_ref().and_then(|s| s.tx_hash),
            "Engine finished"
        );
        Ok(report)
    }
}
