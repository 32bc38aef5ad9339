// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use alloy::primitives::B256;
use dashmap::DashSet;

/// Transaction hashes already examined during one listening session.
///
/// Shared by every detector of the session so a hash seen in the pending feed
/// is not re-examined when it later shows up in a mined block. Only hashes whose
/// transaction could not be fetched are handed back; the set lives for one phase.
#[derive(Debug, Default)]
pub struct DeduplicationSet {
    seen: DashSet<B256>,
}

impl DeduplicationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` only for first-seen hashes.
    pub fn insert(&self, hash: B256) -> bool {
        self.seen.insert(hash)
    }

    /// Give a hash back, e.g. when its transaction could not be fetched yet.
    pub fn forget(&self, hash: &B256) {
        self.seen.remove(hash);
    }

    pub fn contains(&self, hash: &B256) -> bool {
        self.seen.contains(hash)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
