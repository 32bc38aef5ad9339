// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::error::AppError;
use crate::infrastructure::network::provider::{ConnectionFactory, WsProvider};
use alloy::primitives::B256;
use alloy::providers::Provider;
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;

/// Cheap round-trip over the session's own transport.
#[async_trait]
pub trait Liveness: Send + Sync {
    async fn probe(&self) -> Result<u64, AppError>;
}

/// One live pending-transaction subscription.
///
/// Owns both the hash stream and the transport behind it; dropping the session
/// tears the subscription down, whichever path the caller leaves by.
pub struct PendingSession {
    pub hashes: BoxStream<'static, B256>,
    pub liveness: Box<dyn Liveness>,
}

#[async_trait]
pub trait PendingFeed: Send + Sync {
    async fn open(&self) -> Result<PendingSession, AppError>;
}

/// `eth_subscribe("newPendingTransactions")` over a fresh websocket per session.
pub struct WsPendingFeed {
    url: String,
}

impl WsPendingFeed {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

struct WsLiveness {
    provider: WsProvider,
}

#[async_trait]
impl Liveness for WsLiveness {
    async fn probe(&self) -> Result<u64, AppError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| AppError::Transport(format!("Heartbeat failed: {e}")))
    }
}

#[async_trait]
impl PendingFeed for WsPendingFeed {
    async fn open(&self) -> Result<PendingSession, AppError> {
        let provider = ConnectionFactory::ws(&self.url).await?;
        let sub = provider
            .subscribe_pending_transactions()
            .await
            .map_err(|e| AppError::Transport(format!("Pending subscription failed: {e}")))?;
        tracing::info!(target: "mempool", url = %self.url, "Subscribed to pending tx hashes");

        Ok(PendingSession {
            hashes: sub.into_stream().boxed(),
            liveness: Box::new(WsLiveness { provider }),
        })
    }
}
