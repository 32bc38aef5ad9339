// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

pub mod builder;
pub mod detector;
pub mod engine;
pub mod guard;
pub mod recognition;
pub mod submission;
pub mod supervisor;

pub use engine::SnipeEngine;
pub use guard::{ExecutionGuard, TriggerSink};
pub use recognition::{Classification, RecognitionTable};
