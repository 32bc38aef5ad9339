#![allow(dead_code)]

use alloy::primitives::{Address, B256, Bytes, U256, keccak256};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use dashmap::DashMap;
use futures::StreamExt;
use oxidity_sniper::common::metrics::SnipeStats;
use oxidity_sniper::data::abi::selector_of;
use oxidity_sniper::domain::error::AppError;
use oxidity_sniper::domain::types::{ObservedTx, PurchaseIntent, ReceiptSummary, StatusPollMode};
use oxidity_sniper::network::gas::GasPolicyConfig;
use oxidity_sniper::network::ingest::mempool::{Liveness, PendingFeed, PendingSession};
use oxidity_sniper::network::ledger::LedgerClient;
use oxidity_sniper::network::relay::{BundleRequest, BundleStats, RelayClient};
use oxidity_sniper::snipe::builder::TxBuilder;
use oxidity_sniper::snipe::engine::{EngineParts, SnipeEngine};
use oxidity_sniper::snipe::recognition::RecognitionTable;
use oxidity_sniper::snipe::submission::SubmissionConfig;
use oxidity_sniper::snipe::supervisor::SupervisorConfig;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub const CONTRACT: Address = Address::new([0x42; 20]);
pub const GAS_PRICE: u128 = 1_000_000_000;

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// In-memory ledger. Public sends land with `land_public` status when set.
pub struct FakeLedger {
    pub head: AtomicU64,
    pub txs: DashMap<B256, ObservedTx>,
    pub blocks: DashMap<u64, Vec<ObservedTx>>,
    pub status_active: AtomicBool,
    pub receipts: DashMap<B256, ReceiptSummary>,
    pub sent: Mutex<Vec<Bytes>>,
    pub land_public: Mutex<Option<bool>>,
    pub fetched: Mutex<Vec<B256>>,
    /// Fetching this hash waits until the first status read starts.
    pub held_fetch: Mutex<Option<B256>>,
    /// The first status read waits until someone reads the nonce.
    pub hold_status_until_nonce: AtomicBool,
    fetch_release: Notify,
    nonce_read: Notify,
}

impl Default for FakeLedger {
    fn default() -> Self {
        Self {
            head: AtomicU64::new(100),
            txs: DashMap::new(),
            blocks: DashMap::new(),
            status_active: AtomicBool::new(false),
            receipts: DashMap::new(),
            sent: Mutex::new(Vec::new()),
            land_public: Mutex::new(None),
            fetched: Mutex::new(Vec::new()),
            held_fetch: Mutex::new(None),
            hold_status_until_nonce: AtomicBool::new(false),
            fetch_release: Notify::new(),
            nonce_read: Notify::new(),
        }
    }
}

impl FakeLedger {
    pub fn sent(&self) -> Vec<Bytes> {
        lock(&self.sent).clone()
    }

    pub fn fetched(&self) -> Vec<B256> {
        lock(&self.fetched).clone()
    }

    pub fn mine(&self, txs: Vec<ObservedTx>) -> u64 {
        let number = self.head.fetch_add(1, Ordering::SeqCst) + 1;
        self.blocks.insert(number, txs);
        number
    }
}

#[async_trait]
impl LedgerClient for FakeLedger {
    async fn block_number(&self) -> Result<u64, AppError> {
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn transaction_by_hash(&self, hash: B256) -> Result<Option<ObservedTx>, AppError> {
        lock(&self.fetched).push(hash);
        let held = *lock(&self.held_fetch) == Some(hash);
        if held {
            self.fetch_release.notified().await;
        }
        Ok(self.txs.get(&hash).map(|t| t.clone()))
    }

    async fn block_transactions(&self, number: u64) -> Result<Option<Vec<ObservedTx>>, AppError> {
        if number > self.head.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(Some(
            self.blocks.get(&number).map(|b| b.clone()).unwrap_or_default(),
        ))
    }

    async fn call(&self, _to: Address, _data: Bytes) -> Result<Bytes, AppError> {
        if self.hold_status_until_nonce.swap(false, Ordering::SeqCst) {
            self.fetch_release.notify_one();
            self.nonce_read.notified().await;
        }
        let mut word = [0u8; 32];
        word[31] = self.status_active.load(Ordering::SeqCst) as u8;
        Ok(Bytes::copy_from_slice(&word))
    }

    async fn transaction_receipt(&self, hash: B256) -> Result<Option<ReceiptSummary>, AppError> {
        Ok(self.receipts.get(&hash).map(|r| *r))
    }

    async fn balance(&self, _: Address) -> Result<U256, AppError> {
        Ok(U256::from(10u64).pow(U256::from(21u64)))
    }

    async fn estimate_gas(&self, _: Address, _: Address, _: U256, _: Bytes) -> Result<u64, AppError> {
        Ok(150_000)
    }

    async fn gas_price(&self) -> Result<u128, AppError> {
        Ok(GAS_PRICE)
    }

    async fn nonce(&self, _: Address) -> Result<u64, AppError> {
        self.nonce_read.notify_one();
        Ok(0)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, AppError> {
        lock(&self.sent).push(Bytes::copy_from_slice(raw));
        let hash = keccak256(raw);
        if let Some(success) = *lock(&self.land_public) {
            let block = self.head.load(Ordering::SeqCst) + 1;
            self.receipts.insert(
                hash,
                ReceiptSummary {
                    tx_hash: hash,
                    success,
                    block_number: Some(block),
                },
            );
        }
        Ok(hash)
    }
}

/// Relay stub. With `include` set, the first stats query reports the bundle landed.
#[derive(Default)]
pub struct FakeRelay {
    pub reject: bool,
    pub include: Option<bool>,
    pub ledger: Option<Arc<FakeLedger>>,
    pub bundles: Mutex<Vec<BundleRequest>>,
    pub queries: Mutex<Vec<u64>>,
    /// Set if a stats query ever ran after something hit the public pool.
    pub polled_after_broadcast: AtomicBool,
}

impl FakeRelay {
    pub fn bundles(&self) -> Vec<BundleRequest> {
        lock(&self.bundles).clone()
    }

    pub fn queries(&self) -> Vec<u64> {
        lock(&self.queries).clone()
    }
}

#[async_trait]
impl RelayClient for FakeRelay {
    fn name(&self) -> &str {
        "fake-relay"
    }

    async fn submit_bundle(&self, request: &BundleRequest) -> Result<String, AppError> {
        lock(&self.bundles).push(request.clone());
        if self.reject {
            return Err(AppError::Relay {
                relay: "fake-relay".into(),
                reason: "bundle rejected".into(),
            });
        }
        Ok(format!("0xbundle{}", lock(&self.bundles).len()))
    }

    async fn bundle_stats(&self, _bundle_id: &str, block: u64) -> Result<BundleStats, AppError> {
        lock(&self.queries).push(block);
        if let Some(ledger) = &self.ledger
            && !ledger.sent().is_empty()
        {
            self.polled_after_broadcast.store(true, Ordering::SeqCst);
        }
        let Some(success) = self.include else {
            return Ok(BundleStats::default());
        };
        let raw = {
            let bundles = lock(&self.bundles);
            let Some(first) = bundles.first() else {
                return Ok(BundleStats::default());
            };
            hex::decode(first.txs[0].trim_start_matches("0x"))
                .map_err(|e| AppError::Decode(e.to_string()))?
        };
        let hash = keccak256(&raw);
        if let Some(ledger) = &self.ledger {
            ledger.receipts.insert(
                hash,
                ReceiptSummary {
                    tx_hash: hash,
                    success,
                    block_number: Some(block),
                },
            );
        }
        Ok(BundleStats {
            included: true,
            tx_hashes: vec![hash],
        })
    }
}

struct AlwaysAlive;

#[async_trait]
impl Liveness for AlwaysAlive {
    async fn probe(&self) -> Result<u64, AppError> {
        Ok(1)
    }
}

/// Scripted pending feed: each entry is one `open()`. `None` fails to open;
/// `Some(hashes)` yields them and then stays open.
#[derive(Default)]
pub struct FakeFeed {
    pub script: Mutex<VecDeque<Option<Vec<B256>>>>,
    pub opens: AtomicU64,
}

impl FakeFeed {
    pub fn new(script: Vec<Option<Vec<B256>>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            opens: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl PendingFeed for FakeFeed {
    async fn open(&self) -> Result<PendingSession, AppError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        match lock(&self.script).pop_front() {
            Some(Some(hashes)) => Ok(PendingSession {
                hashes: futures::stream::iter(hashes)
                    .chain(futures::stream::pending())
                    .boxed(),
                liveness: Box::new(AlwaysAlive),
            }),
            _ => Err(AppError::Connection("connection refused".into())),
        }
    }
}

pub fn gating_tx(tag: u8, flag: u8) -> ObservedTx {
    let mut input = selector_of("enablePresale(bool)").expect("selector").to_vec();
    let mut word = [0u8; 32];
    word[31] = flag;
    input.extend_from_slice(&word);
    ObservedTx {
        hash: B256::repeat_byte(tag),
        to: Some(CONTRACT),
        input: Bytes::from(input),
    }
}

pub fn intent() -> PurchaseIntent {
    PurchaseIntent::new(
        CONTRACT,
        selector_of("presale(uint256)").expect("selector"),
        2,
        U256::from(100_000_000_000_000u64),
    )
    .expect("intent")
}

pub struct Harness {
    pub ledger: Arc<FakeLedger>,
    pub relay: Option<Arc<FakeRelay>>,
    pub feed: Option<Arc<FakeFeed>>,
    pub stats: Arc<SnipeStats>,
    pub mode: StatusPollMode,
}

impl Harness {
    pub fn new(ledger: Arc<FakeLedger>) -> Self {
        Self {
            ledger,
            relay: None,
            feed: None,
            stats: Arc::new(SnipeStats::default()),
            mode: StatusPollMode::Always,
        }
    }

    pub fn with_relay(mut self, relay: FakeRelay) -> Self {
        self.relay = Some(Arc::new(relay));
        self
    }

    pub fn with_feed(mut self, feed: FakeFeed) -> Self {
        self.feed = Some(Arc::new(feed));
        self
    }

    pub fn with_mode(mut self, mode: StatusPollMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn engine(&self) -> SnipeEngine {
        SnipeEngine::new(EngineParts {
            ledger: self.ledger.clone(),
            feed: self.feed.clone().map(|f| f as Arc<dyn PendingFeed>),
            relay: self.relay.clone().map(|r| r as Arc<dyn RelayClient>),
            builder: Arc::new(TxBuilder::new(PrivateKeySigner::random(), 1)),
            intent: intent(),
            table: RecognitionTable::from_config(
                &[
                    "enablePresale(bool)".to_string(),
                    "enablePresale()".to_string(),
                ],
                &[],
            )
            .expect("table"),
            status_calldata: Bytes::copy_from_slice(
                selector_of("isPresaleActive()").expect("selector").as_slice(),
            ),
            gas: GasPolicyConfig {
                base_gas: 50_000,
                per_unit_gas: 70_000,
                safety_multiplier_bps: 13_000,
                fallback_estimate: 200_000,
                relay_escalation_bps: 300_000,
                public_escalation_bps: 20_000,
            },
            supervisor: SupervisorConfig {
                subscription_warmup: Duration::from_millis(200),
                heartbeat_interval: Duration::from_secs(1),
                reconnect_backoff: vec![Duration::from_millis(50), Duration::from_millis(50)],
                restart_delay: Duration::from_millis(100),
                block_poll_interval: Duration::from_millis(50),
                status_poll_interval: Duration::from_millis(50),
                status_poll_mode: self.mode,
                fetch_concurrency: 4,
            },
            submission: SubmissionConfig {
                inclusion_window_blocks: 3,
                relay_settle_delay: Duration::from_millis(100),
                relay_poll_interval: Duration::from_millis(50),
                bundle_time_window_secs: 120,
                receipt_poll: Duration::from_millis(50),
                public_confirm_timeout: Duration::from_millis(500),
            },
            stats: self.stats.clone(),
        })
    }
}
