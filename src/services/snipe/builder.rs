// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::domain::error::AppError;
use crate::domain::types::PurchaseIntent;
use crate::infrastructure::data::abi::encode_purchase;
use crate::infrastructure::network::gas::GasQuote;
use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, B256, Bytes, TxKind};
use alloy::signers::local::PrivateKeySigner;

/// A purchase signed and ready for any delivery path.
#[derive(Debug, Clone)]
pub struct SignedPurchase {
    pub raw: Bytes,
    pub tx_hash: B256,
    pub nonce: u64,
    pub quote: GasQuote,
}

/// Builds and signs the purchase call as a legacy (type 0) transaction.
pub struct TxBuilder {
    signer: PrivateKeySigner,
    chain_id: u64,
}

impl TxBuilder {
    pub fn new(signer: PrivateKeySigner, chain_id: u64) -> Self {
        Self { signer, chain_id }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn calldata(intent: &PurchaseIntent) -> Bytes {
        encode_purchase(intent.function_selector, intent.amount)
    }

    pub fn sign(
        &self,
        intent: &PurchaseIntent,
        nonce: u64,
        quote: &GasQuote,
    ) -> Result<SignedPurchase, AppError> {
        let mut tx = TxLegacy {
            chain_id: Some(self.chain_id),
            nonce,
            gas_price: quote.gas_price,
            gas_limit: quote.gas_limit,
            to: TxKind::Call(intent.contract_address),
            value: intent.total_value()?,
            input: Self::calldata(intent),
        };

        let sig = TxSignerSync::sign_transaction_sync(&self.signer, &mut tx)
            .map_err(|e| AppError::Signing(format!("Sign tx failed: {}", e)))?;
        let signed: TxEnvelope = tx.into_signed(sig).into();
        let raw = signed.encoded_2718();
        Ok(SignedPurchase {
            raw: Bytes::from(raw),
            tx_hash: *signed.tx_hash(),
            nonce,
            quote: *quote,
        })
    }
}
