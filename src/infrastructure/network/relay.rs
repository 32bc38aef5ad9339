// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::constants::{FLASHBOTS_SIGNATURE_HEADER, RELAY_TIMEOUT_MS};
use crate::domain::error::AppError;
use alloy::primitives::{Address, B256, keccak256};
use alloy::signers::SignerSync;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use reqwest::header::HeaderValue;
use serde::Serialize;
use serde_json::{Value, json};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// `eth_sendBundle` parameters for a single signed transaction.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BundleRequest {
    pub txs: Vec<String>,
    pub block_number: String,
    pub min_timestamp: u64,
    pub max_timestamp: u64,
}

impl BundleRequest {
    pub fn single(raw_tx: &[u8], target_block: u64, now_unix: u64, window_secs: u64) -> Self {
        Self {
            txs: vec![format!("0x{}", hex::encode(raw_tx))],
            block_number: format!("0x{target_block:x}"),
            min_timestamp: now_unix,
            max_timestamp: now_unix.saturating_add(window_secs),
        }
    }
}

/// What the relay knows about a bundle at one block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BundleStats {
    pub included: bool,
    pub tx_hashes: Vec<B256>,
}

#[async_trait]
pub trait RelayClient: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the relay's bundle id. Any error is a rejection.
    async fn submit_bundle(&self, request: &BundleRequest) -> Result<String, AppError>;

    async fn bundle_stats(&self, bundle_id: &str, block: u64) -> Result<BundleStats, AppError>;
}

/// Signs relay request bodies for the `X-Flashbots-Signature` header.
pub struct RelayAuth {
    signer: PrivateKeySigner,
}

impl RelayAuth {
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn sign_request(&self, body_bytes: &[u8]) -> Result<String, AppError> {
        // EIP-191 over the keccak256(body) hex string, not over the raw digest.
        let message_hash = keccak256(body_bytes).to_string();
        let signature = self
            .signer
            .sign_message_sync(message_hash.as_bytes())
            .map_err(|e| AppError::Relay {
                relay: "auth".to_string(),
                reason: format!("Request signing failed: {e}"),
            })?;
        Ok(format!(
            "{}:0x{}",
            self.signer.address(),
            hex::encode(signature.as_bytes())
        ))
    }
}

pub struct FlashbotsRelay {
    url: String,
    auth: RelayAuth,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl FlashbotsRelay {
    pub fn new(url: impl Into<String>, auth: RelayAuth) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(RELAY_TIMEOUT_MS))
            .build()
            .map_err(|e| AppError::Initialization(format!("Relay client build failed: {e}")))?;
        Ok(Self {
            url: url.into(),
            auth,
            client,
            next_id: AtomicU64::new(1),
        })
    }

    fn relay_err(&self, reason: impl Into<String>) -> AppError {
        AppError::Relay {
            relay: self.url.clone(),
            reason: reason.into(),
        }
    }

    async fn post(&self, method: &str, params: Value) -> Result<Value, AppError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": [params],
        });
        let body_bytes =
            serde_json::to_vec(&body).map_err(|e| self.relay_err(format!("encode: {e}")))?;
        let sig_header = self.auth.sign_request(&body_bytes)?;

        let resp = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header(
                FLASHBOTS_SIGNATURE_HEADER,
                HeaderValue::from_str(&sig_header)
                    .map_err(|e| self.relay_err(format!("Signature header invalid: {e}")))?,
            )
            .body(body_bytes)
            .send()
            .await
            .map_err(|e| self.relay_err(format!("{method} POST failed: {e}")))?;

        let status = resp.status();
        let body_text = resp.text().await.unwrap_or_default();
        tracing::debug!(target: "relay", method, %status, body = %body_text, "Relay response");
        if !status.is_success() {
            return Err(self.relay_err(format!("{method} HTTP {status}: {body_text}")));
        }
        serde_json::from_str(&body_text)
            .map_err(|e| self.relay_err(format!("{method} returned invalid JSON: {e}")))
    }
}

#[async_trait]
impl RelayClient for FlashbotsRelay {
    fn name(&self) -> &str {
        &self.url
    }

    async fn submit_bundle(&self, request: &BundleRequest) -> Result<String, AppError> {
        let params =
            serde_json::to_value(request).map_err(|e| self.relay_err(format!("encode: {e}")))?;
        let response = self.post("eth_sendBundle", params).await?;
        if let Some(err) = response.get("error") {
            return Err(self.relay_err(format!("eth_sendBundle rejected: {err}")));
        }
        extract_bundle_id(&response)
            .ok_or_else(|| self.relay_err("eth_sendBundle returned no bundle hash"))
    }

    async fn bundle_stats(&self, bundle_id: &str, block: u64) -> Result<BundleStats, AppError> {
        let params = json!({
            "bundleHash": bundle_id,
            "blockNumber": format!("0x{block:x}"),
        });
        let response = self.post("flashbots_getBundleStatsV2", params).await?;
        parse_bundle_stats(&response).map_err(|reason| self.relay_err(reason))
    }
}

fn extract_bundle_id(response: &Value) -> Option<String> {
    let result = response.get("result")?;
    if let Some(s) = result.as_str() {
        return Some(s.to_string());
    }
    if let Some(obj) = result.as_object() {
        for key in ["bundleHash", "bundle_hash", "hash", "bundleId", "uuid"] {
            if let Some(v) = obj.get(key).and_then(|v| v.as_str()) {
                return Some(v.to_string());
            }
        }
    }
    None
}

fn parse_bundle_stats(response: &Value) -> Result<BundleStats, String> {
    if let Some(err) = response.get("error") {
        return Err(format!("flashbots_getBundleStatsV2 error: {err}"));
    }
    let Some(result) = response.get("result") else {
        return Ok(BundleStats::default());
    };

    let included = result
        .get("isIncluded")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    // Entries are plain hashes on most relays, objects on some.
    let tx_hashes = result
        .get("transactions")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    entry
                        .as_str()
                        .or_else(|| entry.get("txHash").and_then(Value::as_str))
                        .or_else(|| entry.get("hash").and_then(Value::as_str))
                })
                .filter_map(|raw| B256::from_str(raw).ok())
                .collect()
        })
        .unwrap_or_default();

    Ok(BundleStats {
        included,
        tx_hashes,
    })
}
