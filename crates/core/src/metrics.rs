// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{BringUpObserver, Phase};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Word and byte counters for a bring-up run.
#[derive(Debug)]
pub struct BringUpMetrics {
    zeroed_words: AtomicU64,
    copied_words: AtomicU64,
    console_bytes: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub zeroed_words: u64,
    pub copied_words: u64,
    pub console_bytes: u64,
}

impl Default for BringUpMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl BringUpMetrics {
    pub fn new() -> Self {
        Self {
            zeroed_words: AtomicU64::new(0),
            copied_words: AtomicU64::new(0),
            console_bytes: AtomicU64::new(0),
        }
    }

    pub fn reset(&self) {
        self.zeroed_words.store(0, Ordering::SeqCst);
        self.copied_words.store(0, Ordering::SeqCst);
        self.console_bytes.store(0, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            zeroed_words: self.zeroed_words.load(Ordering::SeqCst),
            copied_words: self.copied_words.load(Ordering::SeqCst),
            console_bytes: self.console_bytes.load(Ordering::SeqCst),
        }
    }
}

impl BringUpObserver for BringUpMetrics {
    fn on_bring_up_start(&self) {
        self.reset();
    }

    fn on_word_written(&self, phase: Phase, _addr: u64) {
        let counter = match phase {
            Phase::ZeroFill => &self.zeroed_words,
            Phase::CopyData | Phase::CopyData2 => &self.copied_words,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    fn on_console_byte(&self, _byte: u8) {
        self.console_bytes.fetch_add(1, Ordering::SeqCst);
    }
}
