// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::constants;
use crate::domain::error::AppError;
use crate::domain::types::{PurchaseIntent, StatusPollMode};
use crate::infrastructure::data::abi::{parse_function, parse_selector, selector_of};
use alloy::primitives::{Address, Selector, U256};
use alloy::signers::local::PrivateKeySigner;
use config::{Config, Environment, File};
use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    // General
    #[serde(default = "default_false")]
    pub debug: bool,
    #[serde(default = "default_false")]
    pub log_json: bool,
    pub metrics_port: Option<u16>,

    // Endpoints
    pub http_provider: String,
    pub websocket_provider: Option<String>,
    pub chain_id: Option<u64>,

    // Identity
    pub wallet_key: String,
    pub wallet_address: Option<Address>,
    pub bundle_signer_key: Option<String>,

    // Purchase
    pub contract_address: Address,
    pub purchase_amount: u64,
    /// Decimal or `0x` hex, in wei.
    pub unit_price_wei: String,
    #[serde(default = "default_purchase_signature")]
    pub purchase_signature: String,

    // Recognition
    #[serde(
        default = "default_gating_signatures",
        deserialize_with = "deserialize_string_list"
    )]
    pub gating_signatures: Vec<String>,
    #[serde(
        default = "default_gating_selectors",
        deserialize_with = "deserialize_string_list"
    )]
    pub gating_selectors: Vec<String>,
    #[serde(default = "default_status_signature")]
    pub status_signature: String,
    #[serde(default = "default_status_poll_mode")]
    pub status_poll_mode: String,

    // Gas
    #[serde(default = "default_base_gas")]
    pub base_gas: u64,
    #[serde(default = "default_per_unit_gas")]
    pub per_unit_gas: u64,
    #[serde(default = "default_gas_safety_multiplier_bps")]
    pub gas_safety_multiplier_bps: u64,
    #[serde(default = "default_fallback_gas_estimate")]
    pub fallback_gas_estimate: u64,
    #[serde(default = "default_relay_gas_escalation_bps")]
    pub relay_gas_escalation_bps: u64,
    #[serde(default = "default_public_gas_escalation_bps")]
    pub public_gas_escalation_bps: u64,

    // Relay
    #[serde(default = "default_true")]
    pub relay_enabled: bool,
    pub flashbots_relay_url: Option<String>,
    #[serde(default = "default_inclusion_window_blocks")]
    pub inclusion_window_blocks: u64,
    #[serde(default = "default_relay_settle_delay_ms")]
    pub relay_settle_delay_ms: u64,
    #[serde(default = "default_relay_poll_interval_ms")]
    pub relay_poll_interval_ms: u64,
    #[serde(default = "default_bundle_time_window_secs")]
    pub bundle_time_window_secs: u64,

    // Detection / supervision
    #[serde(default = "default_subscription_warmup_ms")]
    pub subscription_warmup_ms: u64,
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    #[serde(
        default = "default_reconnect_backoff_ms",
        deserialize_with = "deserialize_u64_list"
    )]
    pub reconnect_backoff_ms: Vec<u64>,
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,
    #[serde(default = "default_block_poll_interval_ms")]
    pub block_poll_interval_ms: u64,
    #[serde(default = "default_status_poll_interval_ms")]
    pub status_poll_interval_ms: u64,
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,

    // Confirmation
    #[serde(default = "default_receipt_poll_ms")]
    pub receipt_poll_ms: u64,
    #[serde(default = "default_public_confirm_timeout_ms")]
    pub public_confirm_timeout_ms: u64,
}

// Defaults
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_purchase_signature() -> String {
    constants::DEFAULT_PURCHASE_SIGNATURE.to_string()
}
fn default_gating_signatures() -> Vec<String> {
    constants::DEFAULT_GATING_SIGNATURES
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_gating_selectors() -> Vec<String> {
    constants::DEFAULT_GATING_SELECTORS
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_status_signature() -> String {
    constants::DEFAULT_STATUS_SIGNATURE.to_string()
}
fn default_status_poll_mode() -> String {
    "always".to_string()
}
fn default_base_gas() -> u64 {
    constants::DEFAULT_BASE_GAS
}
fn default_per_unit_gas() -> u64 {
    constants::DEFAULT_PER_UNIT_GAS
}
fn default_gas_safety_multiplier_bps() -> u64 {
    constants::DEFAULT_GAS_SAFETY_MULTIPLIER_BPS
}
fn default_fallback_gas_estimate() -> u64 {
    constants::DEFAULT_FALLBACK_GAS_ESTIMATE
}
fn default_relay_gas_escalation_bps() -> u64 {
    constants::DEFAULT_RELAY_GAS_ESCALATION_BPS
}
fn default_public_gas_escalation_bps() -> u64 {
    constants::DEFAULT_PUBLIC_GAS_ESCALATION_BPS
}
fn default_inclusion_window_blocks() -> u64 {
    constants::DEFAULT_INCLUSION_WINDOW_BLOCKS
}
fn default_relay_settle_delay_ms() -> u64 {
    constants::DEFAULT_RELAY_SETTLE_DELAY_MS
}
fn default_relay_poll_interval_ms() -> u64 {
    constants::DEFAULT_RELAY_POLL_INTERVAL_MS
}
fn default_bundle_time_window_secs() -> u64 {
    constants::DEFAULT_BUNDLE_TIME_WINDOW_SECS
}
fn default_subscription_warmup_ms() -> u64 {
    constants::DEFAULT_SUBSCRIPTION_WARMUP_MS
}
fn default_heartbeat_interval_ms() -> u64 {
    constants::DEFAULT_HEARTBEAT_INTERVAL_MS
}
fn default_reconnect_backoff_ms() -> Vec<u64> {
    constants::DEFAULT_RECONNECT_BACKOFF_MS.to_vec()
}
fn default_restart_delay_ms() -> u64 {
    constants::DEFAULT_RESTART_DELAY_MS
}
fn default_block_poll_interval_ms() -> u64 {
    constants::DEFAULT_BLOCK_POLL_INTERVAL_MS
}
fn default_status_poll_interval_ms() -> u64 {
    constants::DEFAULT_STATUS_POLL_INTERVAL_MS
}
fn default_fetch_concurrency() -> usize {
    constants::DEFAULT_FETCH_CONCURRENCY
}
fn default_receipt_poll_ms() -> u64 {
    constants::DEFAULT_RECEIPT_POLL_MS
}
fn default_public_confirm_timeout_ms() -> u64 {
    constants::DEFAULT_PUBLIC_CONFIRM_TIMEOUT_MS
}

fn deserialize_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{Error, SeqAccess, Visitor};
    use std::fmt;

    struct ListVisitor;

    impl<'de> Visitor<'de> for ListVisitor {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a sequence of strings or a semicolon/comma separated string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: Error,
        {
            Ok(split_list(v))
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut out = Vec::new();
            while let Some(elem) = seq.next_element::<String>()? {
                out.push(elem);
            }
            Ok(out)
        }
    }

    deserializer.deserialize_any(ListVisitor)
}

fn deserialize_u64_list<'de, D>(deserializer: D) -> Result<Vec<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{Error, SeqAccess, Visitor};
    use std::fmt;

    struct U64ListVisitor;

    impl<'de> Visitor<'de> for U64ListVisitor {
        type Value = Vec<u64>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a sequence of integers or a comma separated string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: Error,
        {
            parse_u64_list(v).map_err(E::custom)
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: Error,
        {
            Ok(vec![v])
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: Error,
        {
            u64::try_from(v)
                .map(|v| vec![v])
                .map_err(|_| E::custom(format!("negative delay {v}")))
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut out = Vec::new();
            while let Some(elem) = seq.next_element::<u64>()? {
                out.push(elem);
            }
            Ok(out)
        }
    }

    deserializer.deserialize_any(U64ListVisitor)
}

impl Settings {
    pub fn load_with_path(path: Option<&str>) -> Result<Self, AppError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let mut builder = Config::builder();
        if let Some(selected_path) = resolve_config_path(path) {
            builder = builder.add_source(File::from(Path::new(&selected_path)).required(true));
        } else {
            builder = builder.add_source(File::with_name("config").required(false));
        }
        // CLI (in main) > env/.env > file.
        builder = builder.add_source(Environment::default());

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Everything that can be checked without touching the network.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.wallet_key.trim().is_empty() {
            return Err(AppError::Config("WALLET_KEY is missing".to_string()));
        }
        if self.http_provider.trim().is_empty() {
            return Err(AppError::Config("HTTP_PROVIDER is missing".to_string()));
        }
        Url::parse(&self.http_provider)
            .map_err(|e| AppError::Config(format!("Invalid http_provider: {e}")))?;
        if let Some(ws) = self.websocket_provider_value() {
            Url::parse(&ws)
                .map_err(|e| AppError::Config(format!("Invalid websocket_provider: {e}")))?;
        }
        Url::parse(&self.flashbots_relay_url())
            .map_err(|e| AppError::Config(format!("Invalid flashbots_relay_url: {e}")))?;

        self.purchase_intent()?;
        self.status_selector()?;
        for signature in self.gating_signatures.iter().filter(|s| !s.trim().is_empty()) {
            parse_function(signature)?;
        }
        self.gating_selector_values()?;
        self.status_poll_mode_value()?;
        self.wallet_signer()?;
        self.bundle_signer()?;
        Ok(())
    }

    pub fn websocket_provider_value(&self) -> Option<String> {
        self.websocket_provider
            .as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    pub fn flashbots_relay_url(&self) -> String {
        self.flashbots_relay_url
            .as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| constants::DEFAULT_FLASHBOTS_RELAY_URL.to_string())
    }

    pub fn unit_price(&self) -> Result<U256, AppError> {
        U256::from_str(self.unit_price_wei.trim())
            .map_err(|e| AppError::Config(format!("Invalid unit_price_wei: {e}")))
    }

    pub fn purchase_intent(&self) -> Result<PurchaseIntent, AppError> {
        PurchaseIntent::new(
            self.contract_address,
            selector_of(&self.purchase_signature)?,
            self.purchase_amount,
            self.unit_price()?,
        )
    }

    pub fn status_selector(&self) -> Result<Selector, AppError> {
        selector_of(&self.status_signature)
    }

    pub fn gating_selector_values(&self) -> Result<Vec<Selector>, AppError> {
        self.gating_selectors
            .iter()
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_selector(s))
            .collect()
    }

    pub fn status_poll_mode_value(&self) -> Result<StatusPollMode, AppError> {
        StatusPollMode::from_str(&self.status_poll_mode)
    }

    /// Wallet signer, cross-checked against `wallet_address` when one is configured.
    pub fn wallet_signer(&self) -> Result<PrivateKeySigner, AppError> {
        let signer = parse_signer(&self.wallet_key, "wallet_key")?;
        if let Some(expected) = self.wallet_address
            && expected != signer.address()
        {
            return Err(AppError::Config(format!(
                "wallet_address {expected:#x} does not match wallet_key ({:#x})",
                signer.address()
            )));
        }
        Ok(signer)
    }

    /// Relay authentication signer; falls back to the wallet key.
    pub fn bundle_signer(&self) -> Result<PrivateKeySigner, AppError> {
        match self
            .bundle_signer_key
            .as_ref()
            .filter(|k| !k.trim().is_empty())
        {
            Some(key) => parse_signer(key, "bundle_signer_key"),
            None => parse_signer(&self.wallet_key, "wallet_key"),
        }
    }

    pub fn gas_safety_multiplier_bps_value(&self) -> u64 {
        self.gas_safety_multiplier_bps
            .max(constants::BPS_DENOMINATOR as u64)
    }

    pub fn inclusion_window_blocks_value(&self) -> u64 {
        self.inclusion_window_blocks.max(1)
    }

    pub fn relay_settle_delay(&self) -> Duration {
        Duration::from_millis(self.relay_settle_delay_ms)
    }

    pub fn relay_poll_interval(&self) -> Duration {
        floored(self.relay_poll_interval_ms)
    }

    pub fn bundle_time_window_secs_value(&self) -> u64 {
        self.bundle_time_window_secs.max(1)
    }

    pub fn subscription_warmup(&self) -> Duration {
        floored(self.subscription_warmup_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        floored(self.heartbeat_interval_ms)
    }

    pub fn reconnect_backoff(&self) -> Vec<Duration> {
        let raw = if self.reconnect_backoff_ms.is_empty() {
            default_reconnect_backoff_ms()
        } else {
            self.reconnect_backoff_ms.clone()
        };
        raw.into_iter().map(floored).collect()
    }

    pub fn restart_delay(&self) -> Duration {
        floored(self.restart_delay_ms)
    }

    pub fn block_poll_interval(&self) -> Duration {
        floored(self.block_poll_interval_ms)
    }

    pub fn status_poll_interval(&self) -> Duration {
        floored(self.status_poll_interval_ms)
    }

    pub fn fetch_concurrency_value(&self) -> usize {
        self.fetch_concurrency.max(1)
    }

    pub fn receipt_poll(&self) -> Duration {
        floored(self.receipt_poll_ms)
    }

    pub fn public_confirm_timeout(&self) -> Duration {
        floored(self.public_confirm_timeout_ms)
    }
}

fn floored(ms: u64) -> Duration {
    Duration::from_millis(ms.max(constants::MIN_INTERVAL_MS))
}

fn parse_signer(raw: &str, field: &str) -> Result<PrivateKeySigner, AppError> {
    raw.trim()
        .parse::<PrivateKeySigner>()
        .map_err(|e| AppError::Config(format!("Invalid {field}: {e}")))
}

fn resolve_config_path(path: Option<&str>) -> Option<String> {
    path.map(str::to_string)
}

fn split_list(raw: &str) -> Vec<String> {
    // Signatures contain commas ("f(uint256,bool)"), so ';' wins when present.
    let sep = if raw.contains(';') { ';' } else { ',' };
    let cleaned = raw.trim_matches(|c| c == '`' || c == '"' || c == '\'' || c == '[' || c == ']');
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in cleaned.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
        if c == sep && depth == 0 {
            out.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    out.push(current);
    out.into_iter()
        .map(|s| s.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_u64_list(raw: &str) -> Result<Vec<u64>, AppError> {
    split_list(raw)
        .iter()
        .map(|part| {
            part.parse::<u64>()
                .map_err(|_| AppError::Config(format!("Invalid integer in list: {part}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    const KEY_ONE: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";

    fn env_lock_guard() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn base_settings() -> Settings {
        Settings {
            debug: default_false(),
            log_json: default_false(),
            metrics_port: None,
            http_provider: "http://127.0.0.1:8545".to_string(),
            websocket_provider: None,
            chain_id: None,
            wallet_key: KEY_ONE.to_string(),
            wallet_address: None,
            bundle_signer_key: None,
            contract_address: Address::repeat_byte(0x11),
            purchase_amount: 2,
            unit_price_wei: "100000000000000".to_string(),
            purchase_signature: default_purchase_signature(),
            gating_signatures: default_gating_signatures(),
            gating_selectors: default_gating_selectors(),
            status_signature: default_status_signature(),
            status_poll_mode: default_status_poll_mode(),
            base_gas: default_base_gas(),
            per_unit_gas: default_per_unit_gas(),
            gas_safety_multiplier_bps: default_gas_safety_multiplier_bps(),
            fallback_gas_estimate: default_fallback_gas_estimate(),
            relay_gas_escalation_bps: default_relay_gas_escalation_bps(),
            public_gas_escalation_bps: default_public_gas_escalation_bps(),
            relay_enabled: default_true(),
            flashbots_relay_url: None,
            inclusion_window_blocks: default_inclusion_window_blocks(),
            relay_settle_delay_ms: default_relay_settle_delay_ms(),
            relay_poll_interval_ms: default_relay_poll_interval_ms(),
            bundle_time_window_secs: default_bundle_time_window_secs(),
            subscription_warmup_ms: default_subscription_warmup_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            reconnect_backoff_ms: default_reconnect_backoff_ms(),
            restart_delay_ms: default_restart_delay_ms(),
            block_poll_interval_ms: default_block_poll_interval_ms(),
            status_poll_interval_ms: default_status_poll_interval_ms(),
            fetch_concurrency: default_fetch_concurrency(),
            receipt_poll_ms: default_receipt_poll_ms(),
            public_confirm_timeout_ms: default_public_confirm_timeout_ms(),
        }
    }

    fn temp_config(tag: &str, body: &str) -> std::path::PathBuf {
        let tmp = std::env::temp_dir().join(format!(
            "sniper-{tag}-{}-{}.toml",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));
        std::fs::write(&tmp, body).expect("write temp config");
        tmp
    }

    #[test]
    fn defaults_validate() {
        let settings = base_settings();
        settings.validate().expect("valid");
        let intent = settings.purchase_intent().expect("intent");
        assert_eq!(
            intent.total_value().expect("value"),
            U256::from(200_000_000_000_000u64)
        );
        assert_eq!(settings.flashbots_relay_url(), "https://relay.flashbots.net");
        assert_eq!(settings.gating_selector_values().expect("sel").len(), 1);
    }

    #[test]
    fn interval_values_have_safe_floor() {
        let mut settings = base_settings();
        settings.status_poll_interval_ms = 0;
        settings.block_poll_interval_ms = 5;
        settings.reconnect_backoff_ms = vec![0, 250];
        settings.fetch_concurrency = 0;
        settings.gas_safety_multiplier_bps = 5_000;
        settings.inclusion_window_blocks = 0;
        assert_eq!(settings.status_poll_interval(), Duration::from_millis(100));
        assert_eq!(settings.block_poll_interval(), Duration::from_millis(100));
        assert_eq!(
            settings.reconnect_backoff(),
            vec![Duration::from_millis(100), Duration::from_millis(250)]
        );
        assert_eq!(settings.fetch_concurrency_value(), 1);
        assert_eq!(settings.gas_safety_multiplier_bps_value(), 10_000);
        assert_eq!(settings.inclusion_window_blocks_value(), 1);
    }

    #[test]
    fn empty_backoff_falls_back_to_default_schedule() {
        let mut settings = base_settings();
        settings.reconnect_backoff_ms.clear();
        assert_eq!(settings.reconnect_backoff().len(), 4);
    }

    #[test]
    fn wallet_address_mismatch_is_rejected() {
        let mut settings = base_settings();
        let signer = settings.wallet_signer().expect("signer");
        settings.wallet_address = Some(signer.address());
        assert!(settings.wallet_signer().is_ok());

        settings.wallet_address = Some(Address::repeat_byte(0x22));
        assert!(matches!(
            settings.wallet_signer(),
            Err(AppError::Config(msg)) if msg.contains("does not match")
        ));
    }

    #[test]
    fn bundle_signer_defaults_to_wallet_key() {
        let mut settings = base_settings();
        let wallet = settings.wallet_signer().expect("wallet").address();
        assert_eq!(settings.bundle_signer().expect("bundle").address(), wallet);

        settings.bundle_signer_key = Some(
            "0x0000000000000000000000000000000000000000000000000000000000000002".to_string(),
        );
        assert_ne!(settings.bundle_signer().expect("bundle").address(), wallet);
    }

    #[test]
    fn bad_unit_price_and_zero_amount_fail_validation() {
        let mut settings = base_settings();
        settings.unit_price_wei = "lots".to_string();
        assert!(matches!(settings.validate(), Err(AppError::Config(_))));

        let mut settings = base_settings();
        settings.purchase_amount = 0;
        assert!(matches!(settings.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn malformed_signatures_fail_validation() {
        let mut settings = base_settings();
        settings.gating_signatures = vec!["enablePresale(bool _state)".to_string()];
        settings.validate().expect("named parameters are fine");

        settings.gating_signatures = vec!["enablePresale(bool".to_string()];
        assert!(matches!(settings.validate(), Err(AppError::Config(_))));

        let mut settings = base_settings();
        settings.status_signature = "isPresaleActive(".to_string();
        assert!(matches!(settings.validate(), Err(AppError::Config(_))));

        let mut settings = base_settings();
        settings.purchase_signature = "presale uint256".to_string();
        assert!(matches!(settings.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn hex_unit_price_is_accepted() {
        let mut settings = base_settings();
        settings.unit_price_wei = "0x5af3107a4000".to_string();
        assert_eq!(
            settings.unit_price().expect("price"),
            U256::from(100_000_000_000_000u64)
        );
    }

    #[test]
    fn list_parsing_keeps_signature_commas() {
        assert_eq!(
            split_list("enablePresale(bool);setSale(uint256,bool)"),
            vec!["enablePresale(bool)", "setSale(uint256,bool)"]
        );
        assert_eq!(
            split_list("enablePresale(bool), enablePresale()"),
            vec!["enablePresale(bool)", "enablePresale()"]
        );
        assert_eq!(
            parse_u64_list("5000, 10000,30000").expect("list"),
            vec![5_000, 10_000, 30_000]
        );
        assert!(parse_u64_list("5000,soon").is_err());
    }

    #[test]
    fn explicit_config_path_is_used() {
        let resolved = resolve_config_path(Some("custom-config.toml"));
        assert_eq!(resolved.as_deref(), Some("custom-config.toml"));
        assert_eq!(resolve_config_path(None), None);
    }

    #[test]
    fn file_values_load_with_defaults() {
        let _env_lock = env_lock_guard();
        let tmp = temp_config(
            "file",
            &format!(
                r#"
http_provider = "http://127.0.0.1:8545"
wallet_key = "{KEY_ONE}"
contract_address = "0x1111111111111111111111111111111111111111"
purchase_amount = 3
unit_price_wei = "100000000000000"
reconnect_backoff_ms = [1000, 2000]
status_poll_mode = "after_suspicion"
"#
            ),
        );

        let loaded = Settings::load_with_path(Some(tmp.to_str().expect("utf8 path")))
            .expect("load settings");
        assert_eq!(loaded.purchase_amount, 3);
        assert_eq!(loaded.reconnect_backoff_ms, vec![1_000, 2_000]);
        assert_eq!(
            loaded.status_poll_mode_value().expect("mode"),
            StatusPollMode::AfterSuspicion
        );
        assert_eq!(loaded.base_gas, 50_000);
        assert!(loaded.relay_enabled);

        std::fs::remove_file(&tmp).ok();
    }

    #[test]
    fn env_overrides_file_values() {
        let _env_lock = env_lock_guard();
        let tmp = temp_config(
            "env-override",
            &format!(
                r#"
http_provider = "http://127.0.0.1:8545"
wallet_key = "{KEY_ONE}"
contract_address = "0x1111111111111111111111111111111111111111"
purchase_amount = 2
unit_price_wei = "1"
"#
            ),
        );
        let old = std::env::var("PURCHASE_AMOUNT").ok();
        unsafe {
            std::env::set_var("PURCHASE_AMOUNT", "7");
        }

        let loaded = Settings::load_with_path(Some(tmp.to_str().expect("utf8 path")))
            .expect("load settings");
        assert_eq!(loaded.purchase_amount, 7);

        std::fs::remove_file(&tmp).ok();
        if let Some(v) = old {
            unsafe { std::env::set_var("PURCHASE_AMOUNT", v) };
        } else {
            unsafe { std::env::remove_var("PURCHASE_AMOUNT") };
        }
    }

    #[test]
    fn missing_required_field_is_config_error() {
        let _env_lock = env_lock_guard();
        let tmp = temp_config(
            "missing",
            r#"
http_provider = "http://127.0.0.1:8545"
purchase_amount = 2
unit_price_wei = "1"
"#,
        );
        let err = Settings::load_with_path(Some(tmp.to_str().expect("utf8 path")))
            .expect_err("contract_address and wallet_key are required");
        assert!(matches!(err, AppError::Config(_)));
        std::fs::remove_file(&tmp).ok();
    }
}
