use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

use avrostub_api::{DataListener, Message};
use tokio::sync::mpsc;

use crate::lock;
use crate::stream::ReadStream;

// ═══════════════════════════════════════════════════════════════
//  TopicLane
// ═══════════════════════════════════════════════════════════════

/// Per-topic delivery state.
#[derive(Default)]
struct TopicLane {
    queue: Mutex<LaneQueue>,
    streams: Mutex<Vec<mpsc::UnboundedSender<Arc<Message>>>>,
}

/// Messages recorded but not yet delivered, in offset order.
#[derive(Default)]
struct LaneQueue {
    pending: VecDeque<Arc<Message>>,
    /// Set while some call is delivering this lane's queue.
    draining: bool,
}

/// The right to drain one lane. Hands it back if a listener panics so the
/// next produce picks up whatever is still queued.
struct DrainTurn<'a> {
    lane: &'a TopicLane,
    finished: bool,
}

impl Drop for DrainTurn<'_> {
    fn drop(&mut self) {
        if !self.finished {
            lock::lock(&self.lane.queue, "topic queue").draining = false;
        }
    }
}

struct Listener {
    owner: u64,
    callback: DataListener,
}

/// Outcome of routing one message.
#[derive(Debug, Clone)]
pub struct Routed {
    pub message: Arc<Message>,
    /// Messages this call delivered, its own included. 0 when the message
    /// was queued behind a delivery already running on the topic; that
    /// delivery hands it on before it finishes.
    pub delivered: usize,
}

// ═══════════════════════════════════════════════════════════════
//  DeliveryRouter
// ═══════════════════════════════════════════════════════════════

/// Fan-out of produced messages to read streams and push listeners.
///
/// Streams are per topic. Listeners are global but only fire for topics
/// in the active set, which grows through `subscribe` / `consume`.
/// Delivery is broadcast: every stream and listener gets every message.
pub struct DeliveryRouter {
    lanes: RwLock<HashMap<String, Arc<TopicLane>>>,
    active_topics: RwLock<Vec<String>>,
    listeners: RwLock<Vec<Listener>>,
}

impl Default for DeliveryRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliveryRouter {
    pub fn new() -> Self {
        Self {
            lanes: RwLock::new(HashMap::new()),
            active_topics: RwLock::new(Vec::new()),
            listeners: RwLock::new(Vec::new()),
        }
    }

    fn lane(&self, topic: &str) -> Arc<TopicLane> {
        if let Some(lane) = lock::read(&self.lanes, "router lanes").get(topic) {
            return lane.clone();
        }
        lock::write(&self.lanes, "router lanes")
            .entry(topic.to_string())
            .or_default()
            .clone()
    }

    /// Register a new stream on `topic`.
    pub fn open_stream(&self, topic: &str) -> ReadStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let lane = self.lane(topic);
        let mut streams = lock::lock(&lane.streams, "topic streams");
        streams.push(tx);
        tracing::debug!(topic = %topic, streams = streams.len(), "read stream opened");
        ReadStream::new(topic.to_string(), rx)
    }

    /// Live streams on `topic`.
    pub fn stream_count(&self, topic: &str) -> usize {
        match lock::read(&self.lanes, "router lanes").get(topic) {
            Some(lane) => lock::lock(&lane.streams, "topic streams")
                .iter()
                .filter(|tx| !tx.is_closed())
                .count(),
            None => 0,
        }
    }

    /// Add `topics` to the active set. Duplicates are kept.
    pub fn activate(&self, topics: &[&str]) {
        let mut active = lock::write(&self.active_topics, "active topics");
        active.extend(topics.iter().map(|t| t.to_string()));
    }

    pub fn is_active(&self, topic: &str) -> bool {
        lock::read(&self.active_topics, "active topics")
            .iter()
            .any(|t| t == topic)
    }

    /// Active set in activation order, duplicates included.
    pub fn active_topics(&self) -> Vec<String> {
        lock::read(&self.active_topics, "active topics").clone()
    }

    pub fn add_listener(&self, owner: u64, callback: DataListener) {
        lock::write(&self.listeners, "listeners").push(Listener { owner, callback });
    }

    /// Drop every listener registered by `owner`. Returns how many went.
    pub fn remove_listeners(&self, owner: u64) -> usize {
        let mut listeners = lock::write(&self.listeners, "listeners");
        let before = listeners.len();
        listeners.retain(|l| l.owner != owner);
        before - listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        lock::read(&self.listeners, "listeners").len()
    }

    /// Record one message of `topic` and deliver it.
    ///
    /// `build` runs under the topic's queue lock and should claim the offset
    /// and record the message, so record order is offset order. Delivery
    /// happens after the lock is released: the first caller to find the
    /// topic idle delivers every queued message in order, including ones
    /// its own listeners produce. A listener may therefore produce to any
    /// topic, its own included, without blocking.
    pub fn sequence(&self, topic: &str, build: impl FnOnce() -> Arc<Message>) -> Routed {
        let lane = self.lane(topic);

        let message = {
            let mut queue = lock::lock(&lane.queue, "topic queue");
            let message = build();
            queue.pending.push_back(message.clone());
            if queue.draining {
                tracing::trace!(
                    topic = %topic,
                    offset = message.offset,
                    "queued behind running delivery"
                );
                return Routed {
                    message,
                    delivered: 0,
                };
            }
            queue.draining = true;
            message
        };

        let mut turn = DrainTurn {
            lane: &lane,
            finished: false,
        };
        let mut delivered = 0;
        while !turn.finished {
            let next = {
                let mut queue = lock::lock(&lane.queue, "topic queue");
                let next = queue.pending.pop_front();
                // Give the turn up under the same lock that saw the queue
                // empty, or a concurrent push could be stranded.
                if next.is_none() {
                    queue.draining = false;
                    turn.finished = true;
                }
                next
            };
            if let Some(next) = next {
                self.deliver(topic, &lane, next);
                delivered += 1;
            }
        }

        Routed { message, delivered }
    }

    fn deliver(&self, topic: &str, lane: &TopicLane, message: Arc<Message>) {
        let streams = {
            let mut streams = lock::lock(&lane.streams, "topic streams");
            let before = streams.len();
            streams.retain(|tx| tx.send(message.clone()).is_ok());
            if streams.len() < before {
                tracing::debug!(
                    topic = %topic,
                    dropped = before - streams.len(),
                    "pruned closed read streams"
                );
            }
            streams.len()
        };

        let listeners = if self.is_active(topic) {
            let callbacks: Vec<DataListener> = lock::read(&self.listeners, "listeners")
                .iter()
                .map(|l| l.callback.clone())
                .collect();
            for callback in &callbacks {
                callback(message.clone());
            }
            callbacks.len()
        } else {
            0
        };

        tracing::trace!(
            topic = %topic,
            offset = message.offset,
            streams,
            listeners,
            "message delivered"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use avrostub_api::MessageStream;
    use bytes::Bytes;

    use super::*;

    fn message(topic: &str, offset: i64) -> Arc<Message> {
        Arc::new(Message {
            topic: topic.to_string(),
            payload: Bytes::new(),
            parsed: serde_json::json!({"n": offset}),
            offset,
            size: 0,
            partition: -1,
            key: None,
            timestamp_ms: 0,
        })
    }

    fn counting_listener(hits: &Arc<AtomicUsize>) -> DataListener {
        let hits = hits.clone();
        Arc::new(move |_: Arc<Message>| {
            hits.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn listeners_fire_only_for_active_topics() {
        let router = DeliveryRouter::new();
        let hits = Arc::new(AtomicUsize::new(0));
        router.add_listener(1, counting_listener(&hits));

        let routed = router.sequence("quotes", || message("quotes", 0));
        assert_eq!(routed.delivered, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        router.activate(&["quotes"]);
        router.sequence("quotes", || message("quotes", 1));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        router.sequence("trades", || message("trades", 0));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn streams_get_the_same_object() {
        let router = DeliveryRouter::new();
        let mut first = router.open_stream("t");
        let mut second = router.open_stream("t");

        let routed = router.sequence("t", || message("t", 0));

        let a = first.try_recv().unwrap();
        let b = second.try_recv().unwrap();
        assert!(Arc::ptr_eq(&a, &routed.message));
        assert!(Arc::ptr_eq(&b, &routed.message));
    }

    #[test]
    fn dropped_streams_are_pruned() {
        let router = DeliveryRouter::new();
        let kept = router.open_stream("t");
        drop(router.open_stream("t"));
        assert_eq!(router.stream_count("t"), 1);

        router.sequence("t", || message("t", 0));
        assert_eq!(lock::lock(&router.lane("t").streams, "test").len(), 1);
        drop(kept);
        assert_eq!(router.stream_count("t"), 0);
    }

    #[test]
    fn removing_listeners_is_per_owner() {
        let router = DeliveryRouter::new();
        let hits = Arc::new(AtomicUsize::new(0));
        router.add_listener(1, counting_listener(&hits));
        router.add_listener(1, counting_listener(&hits));
        router.add_listener(2, counting_listener(&hits));

        assert_eq!(router.remove_listeners(1), 2);
        assert_eq!(router.listener_count(), 1);

        router.activate(&["t", "t"]);
        router.sequence("t", || message("t", 0));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(router.active_topics(), vec!["t".to_string(), "t".to_string()]);
    }

    #[test]
    fn listener_routing_on_its_own_topic_is_queued_not_blocked() {
        let router = Arc::new(DeliveryRouter::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let next = Arc::new(AtomicUsize::new(1));

        let (r, log, counter) = (router.clone(), seen.clone(), next.clone());
        router.add_listener(
            1,
            Arc::new(move |msg: Arc<Message>| {
                log.lock().unwrap().push(msg.offset);
                if msg.offset < 2 {
                    let offset = counter.fetch_add(1, Ordering::SeqCst) as i64;
                    let inner = r.sequence("t", || message("t", offset));
                    assert_eq!(inner.delivered, 0);
                }
            }),
        );
        router.activate(&["t"]);
        let mut stream = router.open_stream("t");

        let routed = router.sequence("t", || message("t", 0));

        assert_eq!(routed.delivered, 3);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
        let streamed: Vec<i64> = std::iter::from_fn(|| stream.try_recv())
            .map(|m| m.offset)
            .collect();
        assert_eq!(streamed, vec![0, 1, 2]);
    }

    #[test]
    fn panicking_listener_does_not_wedge_the_topic() {
        let router = DeliveryRouter::new();
        router.add_listener(
            1,
            Arc::new(|msg: Arc<Message>| {
                if msg.offset == 0 {
                    panic!("listener failure");
                }
            }),
        );
        router.activate(&["t"]);

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            router.sequence("t", || message("t", 0));
        }));
        assert!(outcome.is_err());

        let routed = router.sequence("t", || message("t", 1));
        assert_eq!(routed.delivered, 1);
    }
}
