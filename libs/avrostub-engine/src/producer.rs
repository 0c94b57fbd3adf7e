use std::sync::Arc;

use avrostub_api::{AvroProducer, Message, StubError, TopicHandle, now_ms};
use bytes::Bytes;

use crate::invocations::{InvocationLog, ProduceCall};
use crate::runtime::StubState;

/// Producer handed out by `BrokerStub`.
///
/// Each instance keeps its own call history; the stub sums them up.
pub struct Producer {
    id: u64,
    state: Arc<StubState>,
    calls: Arc<InvocationLog<ProduceCall>>,
}

impl Producer {
    pub(crate) fn new(
        id: u64,
        state: Arc<StubState>,
        calls: Arc<InvocationLog<ProduceCall>>,
    ) -> Self {
        Self { id, state, calls }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// `produce` calls since creation or the last reset, failed ones included.
    pub fn produce_count(&self) -> usize {
        self.calls.count()
    }

    pub fn produce_calls(&self) -> Vec<ProduceCall> {
        self.calls.calls()
    }
}

impl AvroProducer for Producer {
    fn produce(
        &self,
        topic: &TopicHandle,
        partition: i32,
        value: serde_json::Value,
        key: Option<Bytes>,
    ) -> Result<(), StubError> {
        let name = topic.name();
        self.calls.record(ProduceCall {
            topic: name.to_string(),
            partition,
            key: key.clone(),
            value: value.clone(),
        });

        let schema = self.state.schemas.resolve_topic(name).ok_or_else(|| {
            tracing::warn!(topic = %name, "produce to topic without registered schema");
            StubError::MissingSchema(name.to_string())
        })?;

        // Encode before claiming an offset: a rejected value leaves no gap.
        let payload = schema
            .codec
            .encode(schema.id, &value)
            .map_err(|source| StubError::Encoding {
                topic: name.to_string(),
                source,
            })?;

        let state = &self.state;
        let routed = state.router.sequence(name, || {
            let message = Arc::new(Message {
                topic: name.to_string(),
                size: payload.len(),
                payload,
                parsed: value,
                offset: state.offsets.next_offset(name),
                partition,
                key,
                timestamp_ms: now_ms(),
            });
            state.log.append(message.clone());
            message
        });

        tracing::debug!(
            topic = %name,
            producer = self.id,
            schema_id = schema.id,
            offset = routed.message.offset,
            size = routed.message.size,
            delivered = routed.delivered,
            "message produced"
        );
        Ok(())
    }
}
