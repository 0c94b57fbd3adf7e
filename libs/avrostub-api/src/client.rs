use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;

use crate::{CodecError, ConsumerOptions, Message, StubError, TopicHandle};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ════════════════════════════════════════════════════════════════
//  Codec boundary
// ════════════════════════════════════════════════════════════════

/// Encoder for one parsed schema.
///
/// Payloads are framed with the registry id so a consumer can resolve
/// the writer schema.
pub trait SchemaCodec: Send + Sync {
    /// Serialize `value`, prefixed with `schema_id`.
    fn encode(&self, schema_id: i32, value: &serde_json::Value) -> Result<Bytes, CodecError>;

    /// Inverse of `encode`: returns the header id and the decoded value.
    fn decode(&self, payload: &[u8]) -> Result<(i32, serde_json::Value), CodecError>;
}

/// Turns a serialized schema definition into a `SchemaCodec`.
pub trait SchemaParser: Send + Sync {
    fn parse(&self, definition: &str) -> Result<Arc<dyn SchemaCodec>, CodecError>;
}

// ════════════════════════════════════════════════════════════════
//  Client surface
// ════════════════════════════════════════════════════════════════

/// Push listener invoked once per delivered message.
pub type DataListener = Arc<dyn Fn(Arc<Message>) + Send + Sync>;

/// Listener for producer client events such as `delivery-report`.
pub type EventListener = Arc<dyn Fn(serde_json::Value) + Send + Sync>;

/// Completion callback of `AvroConsumer::commit`.
pub type CommitCallback = Box<dyn FnOnce(Result<(), StubError>) + Send>;

/// Lazily read, unbounded sequence of messages for one topic.
pub trait MessageStream: Send {
    fn topic(&self) -> &str;

    /// Wait for the next message. `None` once the owning runtime is gone.
    fn recv(&mut self) -> BoxFuture<'_, Option<Arc<Message>>>;

    /// Next buffered message without waiting.
    fn try_recv(&mut self) -> Option<Arc<Message>>;
}

pub trait AvroProducer: Send + Sync {
    /// Handle for `name`. Never fails.
    fn topic(&self, name: &str) -> TopicHandle {
        TopicHandle::new(name)
    }

    /// Encode `value` with the topic's registered schema and publish it.
    fn produce(
        &self,
        topic: &TopicHandle,
        partition: i32,
        value: serde_json::Value,
        key: Option<Bytes>,
    ) -> Result<(), StubError>;

    /// Serve delivery reports. Nothing to serve in memory.
    fn poll(&self) {}

    /// Register a listener for a client event. Nothing is ever emitted in
    /// memory, so the listener is dropped.
    fn on_event(&self, _event: &str, _listener: EventListener) {}
}

pub trait AvroConsumer: Send + Sync {
    /// Mark `topics` as consumed; listener delivery is gated on this.
    fn subscribe(&self, topics: &[&str]);

    /// Same effect as `subscribe`.
    fn consume(&self, topics: &[&str]);

    /// Register a listener for the `data` event.
    fn on_data(&self, listener: DataListener);

    /// Open a new stream on `topic`, independent of any opened before.
    fn get_read_stream(&self, topic: &str) -> Box<dyn MessageStream>;

    fn commit(&self, message: &Message, callback: Option<CommitCallback>);

    /// Stop delivering to this consumer's listeners.
    fn disconnect(&self);
}

/// Lifecycle surface shared by the real client wrapper and the in-memory stub.
pub trait AvroClient: Send + Sync {
    fn initialize(&self) -> BoxFuture<'_, Result<(), StubError>>;

    fn get_producer(&self) -> BoxFuture<'_, Result<Arc<dyn AvroProducer>, StubError>>;

    fn get_consumer(
        &self,
        options: ConsumerOptions,
    ) -> BoxFuture<'_, Result<Arc<dyn AvroConsumer>, StubError>>;
}
