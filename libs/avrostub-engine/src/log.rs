use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use avrostub_api::Message;

use crate::lock;

/// Every message produced since construction or the last reset, by topic.
#[derive(Debug, Default)]
pub struct ProducedLog {
    topics: RwLock<HashMap<String, Vec<Arc<Message>>>>,
}

impl ProducedLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, message: Arc<Message>) {
        lock::write(&self.topics, "produced log")
            .entry(message.topic.clone())
            .or_default()
            .push(message);
    }

    /// Messages of `topic` in offset order; `None` if nothing was produced.
    pub fn messages(&self, topic: &str) -> Option<Vec<Arc<Message>>> {
        lock::read(&self.topics, "produced log").get(topic).cloned()
    }

    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> =
            lock::read(&self.topics, "produced log").keys().cloned().collect();
        topics.sort();
        topics
    }

    pub fn total(&self) -> usize {
        lock::read(&self.topics, "produced log").values().map(Vec::len).sum()
    }

    pub fn clear(&self) {
        lock::write(&self.topics, "produced log").clear();
    }
}
