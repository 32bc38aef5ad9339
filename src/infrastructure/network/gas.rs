// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::retry::retry_async;
use crate::domain::constants::BPS_DENOMINATOR;
use crate::domain::error::AppError;
use crate::domain::types::{DeliveryPath, PurchaseIntent};
use crate::infrastructure::network::ledger::LedgerClient;
use alloy::primitives::{Address, Bytes};
use std::sync::Arc;
use std::time::Duration;

const READ_ATTEMPTS: usize = 3;
const READ_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasPolicyConfig {
    pub base_gas: u64,
    pub per_unit_gas: u64,
    pub safety_multiplier_bps: u64,
    pub fallback_estimate: u64,
    pub relay_escalation_bps: u64,
    pub public_escalation_bps: u64,
}

/// Gas parameters for one signed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasQuote {
    pub gas_limit: u64,
    pub gas_price: u128,
    /// Unescalated node price the quote was derived from.
    pub network_gas_price: u128,
}

/// Integer-only gas policy. All divisions truncate.
///
/// `gas_limit = max(estimate, base + per_unit * amount) * safety_bps / 10_000`
/// `gas_price = network_price * escalation_bps(path) / 10_000`, escalation floored at 1x.
#[derive(Clone)]
pub struct GasPolicy {
    ledger: Arc<dyn LedgerClient>,
    config: GasPolicyConfig,
}

impl GasPolicy {
    pub fn new(ledger: Arc<dyn LedgerClient>, config: GasPolicyConfig) -> Self {
        Self { ledger, config }
    }

    pub fn gas_limit_for(&self, estimate: u64, amount: u64) -> u64 {
        let floor = self
            .config
            .base_gas
            .saturating_add(self.config.per_unit_gas.saturating_mul(amount));
        let scaled = (estimate.max(floor) as u128)
            .saturating_mul(self.config.safety_multiplier_bps as u128)
            / BPS_DENOMINATOR;
        u64::try_from(scaled).unwrap_or(u64::MAX)
    }

    pub fn escalation_bps(&self, path: DeliveryPath) -> u128 {
        let raw = match path {
            DeliveryPath::PrivateRelay => self.config.relay_escalation_bps,
            DeliveryPath::PublicBroadcast => self.config.public_escalation_bps,
        };
        (raw as u128).max(BPS_DENOMINATOR)
    }

    pub fn escalate(&self, network_gas_price: u128, path: DeliveryPath) -> u128 {
        network_gas_price.saturating_mul(self.escalation_bps(path)) / BPS_DENOMINATOR
    }

    /// Whether both paths would sign at the same price.
    pub fn paths_share_price(&self) -> bool {
        self.escalation_bps(DeliveryPath::PrivateRelay)
            == self.escalation_bps(DeliveryPath::PublicBroadcast)
    }

    pub async fn network_gas_price(&self) -> Result<u128, AppError> {
        let ledger = self.ledger.clone();
        retry_async(
            "eth_gasPrice",
            move |_| {
                let ledger = ledger.clone();
                async move { ledger.gas_price().await }
            },
            READ_ATTEMPTS,
            READ_BACKOFF,
        )
        .await
    }

    /// Node estimate for the purchase call, or the configured fallback when the node refuses.
    pub async fn estimate(&self, from: Address, intent: &PurchaseIntent, calldata: &Bytes) -> u64 {
        let value = match intent.total_value() {
            Ok(v) => v,
            Err(_) => return self.config.fallback_estimate,
        };
        let ledger = self.ledger.clone();
        let to = intent.contract_address;
        let data = calldata.clone();
        let estimate = retry_async(
            "eth_estimateGas",
            move |_| {
                let ledger = ledger.clone();
                let data = data.clone();
                async move { ledger.estimate_gas(from, to, value, data).await }
            },
            READ_ATTEMPTS,
            READ_BACKOFF,
        )
        .await;

        match estimate {
            Ok(gas) => gas,
            Err(e) => {
                tracing::warn!(
                    target: "gas",
                    error = %e,
                    fallback = self.config.fallback_estimate,
                    "Gas estimate failed; using fallback"
                );
                self.config.fallback_estimate
            }
        }
    }

    pub async fn quote(
        &self,
        from: Address,
        intent: &PurchaseIntent,
        calldata: &Bytes,
        path: DeliveryPath,
    ) -> Result<GasQuote, AppError> {
        let estimate = self.estimate(from, intent, calldata).await;
        let network_gas_price = self.network_gas_price().await?;
        let quote = GasQuote {
            gas_limit: self.gas_limit_for(estimate, intent.amount),
            gas_price: self.escalate(network_gas_price, path),
            network_gas_price,
        };
        tracing::info!(
            target: "gas",
            path = path.as_str(),
            estimate,
            gas_limit = quote.gas_limit,
            network_gas_price,
            gas_price = quote.gas_price,
            "Gas quote"
        );
        Ok(quote)
    }

    /// Same limit, price re-derived for another path.
    pub fn reprice(&self, quote: &GasQuote, path: DeliveryPath) -> GasQuote {
        GasQuote {
            gas_price: self.escalate(quote.network_gas_price, path),
            ..*quote
        }
    }
}
