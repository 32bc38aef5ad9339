// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

// =============================================================================
// CONTRACT INTERFACE DEFAULTS
// =============================================================================

/// Gating function signatures the presale contracts are known to ship with.
pub const DEFAULT_GATING_SIGNATURES: [&str; 2] = ["enablePresale(bool)", "enablePresale()"];

/// Raw selectors seen on deployed variants whose signature was never published.
/// These are matched with the trailing-byte heuristic only. Selectors of the
/// signatures above (`0xd1454bf4`, `0xa8eac492`) do not belong here.
pub const DEFAULT_GATING_SELECTORS: [&str; 1] = ["0x5bea0f8e"];

pub const DEFAULT_STATUS_SIGNATURE: &str = "isPresaleActive()";
pub const DEFAULT_PURCHASE_SIGNATURE: &str = "presale(uint256)";

// =============================================================================
// GAS POLICY
// =============================================================================

/// Basis-point denominator for every multiplier in the gas policy.
pub const BPS_DENOMINATOR: u128 = 10_000;

pub const DEFAULT_BASE_GAS: u64 = 50_000;
pub const DEFAULT_PER_UNIT_GAS: u64 = 70_000;
pub const DEFAULT_FALLBACK_GAS_ESTIMATE: u64 = 200_000;
/// +30% headroom on the larger of estimate and size-derived floor.
pub const DEFAULT_GAS_SAFETY_MULTIPLIER_BPS: u64 = 13_000;
/// Relay path pays only on inclusion, so it bids 30x.
pub const DEFAULT_RELAY_GAS_ESCALATION_BPS: u64 = 300_000;
pub const DEFAULT_PUBLIC_GAS_ESCALATION_BPS: u64 = 20_000;

// =============================================================================
// RELAY
// =============================================================================

pub const DEFAULT_FLASHBOTS_RELAY_URL: &str = "https://relay.flashbots.net";
pub const FLASHBOTS_SIGNATURE_HEADER: &str = "X-Flashbots-Signature";
pub const RELAY_TIMEOUT_MS: u64 = 2_500;
pub const DEFAULT_INCLUSION_WINDOW_BLOCKS: u64 = 5;
pub const DEFAULT_RELAY_SETTLE_DELAY_MS: u64 = 15_000;
pub const DEFAULT_RELAY_POLL_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_BUNDLE_TIME_WINDOW_SECS: u64 = 120;

// =============================================================================
// DETECTION / SUPERVISION
// =============================================================================

pub const DEFAULT_SUBSCRIPTION_WARMUP_MS: u64 = 30_000;
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_RECONNECT_BACKOFF_MS: [u64; 4] = [5_000, 10_000, 30_000, 60_000];
pub const DEFAULT_RESTART_DELAY_MS: u64 = 5_000;
pub const DEFAULT_BLOCK_POLL_INTERVAL_MS: u64 = 2_000;
pub const DEFAULT_STATUS_POLL_INTERVAL_MS: u64 = 3_000;
pub const DEFAULT_FETCH_CONCURRENCY: usize = 16;
/// Upper bound on blocks the scanner backfills after a stall.
pub const MAX_BLOCK_BACKFILL: u64 = 16;

// =============================================================================
// CONFIRMATION
// =============================================================================

pub const DEFAULT_RECEIPT_POLL_MS: u64 = 1_000;
pub const DEFAULT_PUBLIC_CONFIRM_TIMEOUT_MS: u64 = 120_000;

/// Floor applied to every configurable interval.
pub const MIN_INTERVAL_MS: u64 = 100;
