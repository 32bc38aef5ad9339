// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

pub mod gas;
pub mod ingest;
pub use ingest::mempool;

pub mod ledger;
pub mod provider;
pub mod relay;
