use std::collections::HashMap;
use std::sync::Mutex;

use crate::lock;

/// Per-topic offset counters.
///
/// A topic gets a counter on its first `next_offset`; until then it has
/// no high watermark at all.
#[derive(Debug, Default)]
pub struct OffsetTracker {
    counters: Mutex<HashMap<String, i64>>,
}

impl OffsetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the next offset of `topic`, starting at 0.
    pub fn next_offset(&self, topic: &str) -> i64 {
        let mut counters = lock::lock(&self.counters, "offset tracker");
        let next = counters.entry(topic.to_string()).or_insert(0);
        let offset = *next;
        *next += 1;
        offset
    }

    /// Offset the next message of `topic` will get.
    pub fn high_watermark(&self, topic: &str) -> Option<i64> {
        lock::lock(&self.counters, "offset tracker").get(topic).copied()
    }

    pub fn reset(&self) {
        lock::lock(&self.counters, "offset tracker").clear();
    }
}
