// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::domain::error::AppError;
use crate::domain::types::{ObservedTx, ReceiptSummary};
use crate::infrastructure::network::provider::HttpProvider;
use alloy::consensus::Transaction as _;
use alloy::eips::BlockNumberOrTag;
use alloy::network::{TransactionBuilder, TransactionResponse};
use alloy::primitives::{Address, B256, Bytes, U256};
use alloy::providers::Provider;
use alloy::rpc::types::{Transaction, TransactionRequest};
use async_trait::async_trait;

/// Read and broadcast surface of the remote ledger.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn block_number(&self) -> Result<u64, AppError>;

    async fn transaction_by_hash(&self, hash: B256) -> Result<Option<ObservedTx>, AppError>;

    /// Full transactions of block `number`; `None` while the node has not seen it.
    async fn block_transactions(&self, number: u64) -> Result<Option<Vec<ObservedTx>>, AppError>;

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, AppError>;

    async fn transaction_receipt(&self, hash: B256) -> Result<Option<ReceiptSummary>, AppError>;

    async fn balance(&self, address: Address) -> Result<U256, AppError>;

    async fn estimate_gas(
        &self,
        from: Address,
        to: Address,
        value: U256,
        data: Bytes,
    ) -> Result<u64, AppError>;

    async fn gas_price(&self) -> Result<u128, AppError>;

    /// Pending-inclusive transaction count.
    async fn nonce(&self, address: Address) -> Result<u64, AppError>;

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, AppError>;
}

pub struct AlloyLedger {
    provider: HttpProvider,
}

impl AlloyLedger {
    pub fn new(provider: HttpProvider) -> Self {
        Self { provider }
    }
}

fn observed(tx: &Transaction) -> ObservedTx {
    ObservedTx {
        hash: tx.tx_hash(),
        to: tx.to(),
        input: tx.input().clone(),
    }
}

fn read_err(method: &str, e: impl std::fmt::Display) -> AppError {
    AppError::Connection(format!("{method} failed: {e}"))
}

#[async_trait]
impl LedgerClient for AlloyLedger {
    async fn block_number(&self) -> Result<u64, AppError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| read_err("eth_blockNumber", e))
    }

    async fn transaction_by_hash(&self, hash: B256) -> Result<Option<ObservedTx>, AppError> {
        let tx = self
            .provider
            .get_transaction_by_hash(hash)
            .await
            .map_err(|e| read_err("eth_getTransactionByHash", e))?;
        Ok(tx.as_ref().map(observed))
    }

    async fn block_transactions(&self, number: u64) -> Result<Option<Vec<ObservedTx>>, AppError> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(number))
            .full()
            .await
            .map_err(|e| read_err("eth_getBlockByNumber", e))?;
        Ok(block.map(|b| b.transactions.txns().map(observed).collect()))
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, AppError> {
        let request = TransactionRequest::default().with_to(to).with_input(data);
        self.provider
            .call(request)
            .await
            .map_err(|e| read_err("eth_call", e))
    }

    async fn transaction_receipt(&self, hash: B256) -> Result<Option<ReceiptSummary>, AppError> {
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| read_err("eth_getTransactionReceipt", e))?;
        Ok(receipt.map(|r| ReceiptSummary {
            tx_hash: r.transaction_hash,
            success: r.status(),
            block_number: r.block_number,
        }))
    }

    async fn balance(&self, address: Address) -> Result<U256, AppError> {
        self.provider
            .get_balance(address)
            .await
            .map_err(|e| read_err("eth_getBalance", e))
    }

    async fn estimate_gas(
        &self,
        from: Address,
        to: Address,
        value: U256,
        data: Bytes,
    ) -> Result<u64, AppError> {
        let request = TransactionRequest::default()
            .with_from(from)
            .with_to(to)
            .with_value(value)
            .with_input(data);
        self.provider
            .estimate_gas(request)
            .await
            .map_err(|e| read_err("eth_estimateGas", e))
    }

    async fn gas_price(&self) -> Result<u128, AppError> {
        self.provider
            .get_gas_price()
            .await
            .map_err(|e| read_err("eth_gasPrice", e))
    }

    async fn nonce(&self, address: Address) -> Result<u64, AppError> {
        self.provider
            .get_transaction_count(address)
            .pending()
            .await
            .map_err(|e| read_err("eth_getTransactionCount", e))
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, AppError> {
        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .map_err(|e| AppError::Transaction {
                hash: "unsent".to_string(),
                reason: e.to_string(),
            })?;
        Ok(*pending.tx_hash())
    }
}
