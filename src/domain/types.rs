// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::error::AppError;
use alloy::primitives::{Address, B256, Bytes, Selector, U256};
use chrono::{DateTime, Utc};
use std::fmt;

/// What to buy, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseIntent {
    pub contract_address: Address,
    pub function_selector: Selector,
    pub amount: u64,
    pub unit_price: U256,
}

impl PurchaseIntent {
    pub fn new(
        contract_address: Address,
        function_selector: Selector,
        amount: u64,
        unit_price: U256,
    ) -> Result<Self, AppError> {
        if amount == 0 {
            return Err(AppError::Config("purchase_amount must be > 0".into()));
        }
        let intent = Self {
            contract_address,
            function_selector,
            amount,
            unit_price,
        };
        intent.total_value()?;
        Ok(intent)
    }

    /// `unit_price * amount`, rejected on overflow.
    pub fn total_value(&self) -> Result<U256, AppError> {
        self.unit_price
            .checked_mul(U256::from(self.amount))
            .ok_or_else(|| AppError::Config("purchase value overflows uint256".into()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerSource {
    Subscription,
    BlockScan,
    StatusPoll,
}

impl TriggerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerSource::Subscription => "subscription",
            TriggerSource::BlockScan => "block_scan",
            TriggerSource::StatusPoll => "status_poll",
        }
    }
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerEvent {
    pub source: TriggerSource,
    pub observed_at: DateTime<Utc>,
    pub evidence: Option<B256>,
}

impl TriggerEvent {
    pub fn now(source: TriggerSource, evidence: Option<B256>) -> Self {
        Self {
            source,
            observed_at: Utc::now(),
            evidence,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Pending,
    Succeeded,
    FailedExhausted,
}

impl ExecutionOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionOutcome::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPath {
    PrivateRelay,
    PublicBroadcast,
}

impl DeliveryPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryPath::PrivateRelay => "private_relay",
            DeliveryPath::PublicBroadcast => "public_broadcast",
        }
    }
}

/// One delivery path tried for the claimed execution.
#[derive(Debug, Clone)]
pub struct SubmissionAttempt {
    pub built_tx: Bytes,
    pub tx_hash: B256,
    pub nonce: u64,
    pub target_block: u64,
    pub relay_bundle_id: Option<String>,
    pub delivery_path: DeliveryPath,
}

/// When the status poller is allowed to read the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusPollMode {
    #[default]
    Always,
    AfterSuspicion,
}

impl std::str::FromStr for StatusPollMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "always" => Ok(StatusPollMode::Always),
            "after_suspicion" => Ok(StatusPollMode::AfterSuspicion),
            other => Err(AppError::Config(format!(
                "Unknown status_poll_mode {other}; expected always or after_suspicion"
            ))),
        }
    }
}

/// Minimal view of a transaction the detectors inspect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedTx {
    pub hash: B256,
    pub to: Option<Address>,
    pub input: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptSummary {
    pub tx_hash: B256,
    pub success: bool,
    pub block_number: Option<u64>,
}
