use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};

use avrostub_api::{
    AvroClient, AvroConsumer, AvroProducer, ConsumerOptions, DataListener, Message, MessageStream,
};
use avrostub_engine::{BrokerStub, StubConfig};
use bytes::Bytes;
use serde::Serialize;

use crate::error::ReplayError;
use crate::input::{self, InputRecord};

#[derive(Debug, Default, Serialize)]
pub struct Summary {
    pub produced: usize,
    pub topics: BTreeMap<String, TopicSummary>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct TopicSummary {
    pub messages: usize,
    pub high_watermark: Option<i64>,
    pub listener_deliveries: usize,
    pub stream_deliveries: usize,
}

// ═══════════════════════════════════════════════════════════════
//  Entry point
// ═══════════════════════════════════════════════════════════════

pub async fn run(
    config_path: &Path,
    input_path: &Path,
    group: Option<String>,
) -> Result<Summary, ReplayError> {
    let config = StubConfig::load(config_path)?;
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let stub = config.build_stub(base_dir)?;
    stub.initialize().await?;
    tracing::info!(schemas = stub.registered_schemas().len(), "fixtures registered");

    let mut options = config.consumer.clone();
    if group.is_some() {
        options.group_id = group;
    }

    let records = input::read_records(input_path)?;
    tracing::info!(records = records.len(), input = %input_path.display(), "replaying");
    replay(&stub, options, &records).await
}

/// Produce `records` through `stub` with one consumer attached to every
/// topic they mention, then report what each delivery path saw.
pub async fn replay(
    stub: &BrokerStub,
    options: ConsumerOptions,
    records: &[InputRecord],
) -> Result<Summary, ReplayError> {
    let topics = input::topics(records);
    let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();

    let consumer = stub.get_consumer(options).await?;
    let mut streams: Vec<Box<dyn MessageStream>> = topic_refs
        .iter()
        .map(|topic| consumer.get_read_stream(topic))
        .collect();

    let pushed: Arc<Mutex<HashMap<String, usize>>> = Arc::default();
    let sink = pushed.clone();
    let listener: DataListener = Arc::new(move |msg: Arc<Message>| {
        if let Ok(mut counts) = sink.lock() {
            *counts.entry(msg.topic.clone()).or_default() += 1;
        }
    });
    consumer.subscribe(&topic_refs);
    consumer.on_data(listener);

    let producer = stub.get_producer().await?;
    for record in records {
        let key = record.key.clone().map(Bytes::from);
        producer.produce(
            &producer.topic(&record.topic),
            record.partition,
            record.value.clone(),
            key,
        )?;
    }
    producer.poll();
    consumer.disconnect();

    let pushed = match pushed.lock() {
        Ok(counts) => counts.clone(),
        Err(poisoned) => {
            tracing::warn!("listener counts lock poisoned, recovering");
            poisoned.into_inner().clone()
        }
    };

    let mut summary = Summary {
        produced: stub.produced_total(),
        topics: BTreeMap::new(),
    };
    for stream in &mut streams {
        let mut drained = 0;
        while stream.try_recv().is_some() {
            drained += 1;
        }
        let topic = stream.topic().to_string();
        let entry = TopicSummary {
            messages: stub.messages_produced(&topic).len(),
            high_watermark: stub.high_watermark(&topic),
            listener_deliveries: pushed.get(&topic).copied().unwrap_or(0),
            stream_deliveries: drained,
        };
        tracing::debug!(topic = %topic, ?entry, "topic replayed");
        summary.topics.insert(topic, entry);
    }
    Ok(summary)
}
