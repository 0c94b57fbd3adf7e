//! Produce / consume through the stub's client surface.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use avrostub_api::{
    AvroClient, AvroConsumer, AvroProducer, ConsumerOptions, Message, MessageStream, PARTITION_UA,
    RegistryFixture, StubError,
};
use avrostub_engine::BrokerStub;
use bytes::Bytes;
use futures::StreamExt;
use serde_json::json;

const TOPIC: &str = "testTopic";

fn test_schema() -> String {
    json!({
        "type": "record",
        "name": "TestRecord",
        "fields": [
            {"name": "name", "type": "string"},
            {"name": "count", "type": "int"}
        ]
    })
    .to_string()
}

fn fixtures() -> Vec<RegistryFixture> {
    vec![
        RegistryFixture::new(TOPIC, 1, 1, test_schema()),
        RegistryFixture::new("otherTopic", 1, 2, r#""string""#),
    ]
}

async fn initialized_stub() -> BrokerStub {
    let stub = BrokerStub::new(fixtures());
    stub.initialize().await.expect("initialize");
    stub
}

fn collecting_listener() -> (Arc<Mutex<Vec<Arc<Message>>>>, avrostub_api::DataListener) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let listener: avrostub_api::DataListener =
        Arc::new(move |msg: Arc<Message>| sink.lock().unwrap().push(msg));
    (seen, listener)
}

#[tokio::test]
async fn produced_message_is_logged_with_offset_and_metadata() {
    let stub = initialized_stub().await;
    let producer = stub.get_producer().await.unwrap();
    let value = json!({"name": "x", "count": 3});

    producer
        .produce(&producer.topic(TOPIC), 2, value.clone(), Some(Bytes::from_static(b"key")))
        .unwrap();

    let messages = stub.messages_produced(TOPIC);
    assert_eq!(messages.len(), 1);
    let msg = &messages[0];
    assert_eq!(msg.topic, TOPIC);
    assert_eq!(msg.offset, 0);
    assert_eq!(msg.partition, 2);
    assert_eq!(msg.parsed, value);
    assert_eq!(msg.key_str(), Some("key"));
    assert_eq!(msg.size, msg.payload.len());
    // magic byte + schema id 1
    assert_eq!(&msg.payload[..5], &[0, 0, 0, 0, 1]);

    let decoded = stub.schema(TOPIC).unwrap().codec.decode(&msg.payload).unwrap();
    assert_eq!(decoded, (1, value));
}

#[tokio::test]
async fn subscribed_listener_receives_message_within_produce_call() {
    let stub = initialized_stub().await;
    let consumer = stub.get_consumer(ConsumerOptions::with_group("g1")).await.unwrap();
    let producer = stub.get_producer().await.unwrap();

    let (seen, listener) = collecting_listener();
    consumer.subscribe(&[TOPIC]);
    consumer.on_data(listener);

    let value = json!({"name": "Thanasis", "count": 540});
    producer
        .produce(&producer.topic(TOPIC), PARTITION_UA, value.clone(), None)
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].parsed, value);
    assert!(Arc::ptr_eq(&seen[0], &stub.messages_produced(TOPIC)[0]));
}

#[tokio::test]
async fn listener_is_silent_until_topic_is_consumed() {
    let stub = initialized_stub().await;
    let consumer = stub.get_consumer(ConsumerOptions::default()).await.unwrap();
    let producer = stub.get_producer().await.unwrap();
    let topic = producer.topic(TOPIC);

    let (seen, listener) = collecting_listener();
    consumer.on_data(listener);

    producer.produce(&topic, PARTITION_UA, json!({"name": "a", "count": 1}), None).unwrap();
    assert!(seen.lock().unwrap().is_empty());

    consumer.consume(&[TOPIC]);
    producer.produce(&topic, PARTITION_UA, json!({"name": "b", "count": 2}), None).unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].offset, 1);
}

#[tokio::test]
async fn stream_yields_produced_message() {
    let stub = initialized_stub().await;
    let consumer = stub.get_consumer(ConsumerOptions::default()).await.unwrap();
    let producer = stub.get_producer().await.unwrap();

    let mut stream = consumer.get_read_stream(TOPIC);
    assert_eq!(stream.topic(), TOPIC);

    let value = json!({"name": "Thanasis", "count": 540});
    producer
        .produce(&producer.topic(TOPIC), PARTITION_UA, value.clone(), Some(Bytes::from("key")))
        .unwrap();

    let msg = tokio::time::timeout(Duration::from_secs(1), stream.recv())
        .await
        .expect("stream should yield")
        .expect("stream open");
    assert_eq!(msg.parsed, value);
    assert!(stream.try_recv().is_none());
}

#[tokio::test]
async fn stream_does_not_need_subscription_and_ignores_other_topics() {
    let stub = initialized_stub().await;
    let consumer = stub.consumer(ConsumerOptions::default()).unwrap();
    let producer = stub.get_producer().await.unwrap();

    let mut stream = consumer.read_stream(TOPIC);
    producer
        .produce(&producer.topic("otherTopic"), PARTITION_UA, json!("ignored"), None)
        .unwrap();
    producer
        .produce(&producer.topic(TOPIC), PARTITION_UA, json!({"name": "n", "count": 0}), None)
        .unwrap();

    let msg = stream.next().await.unwrap();
    assert_eq!(msg.topic, TOPIC);
    assert_eq!(msg.offset, 0);
    assert!(stub.active_topics().is_empty());
}

#[tokio::test]
async fn every_stream_on_a_topic_gets_every_message_in_order() {
    let stub = initialized_stub().await;
    let consumer = stub.get_consumer(ConsumerOptions::default()).await.unwrap();
    let producer = stub.get_producer().await.unwrap();
    let topic = producer.topic(TOPIC);

    let mut streams: Vec<_> = (0..3).map(|_| consumer.get_read_stream(TOPIC)).collect();
    assert_eq!(stub.stream_count(TOPIC), 3);

    for i in 0..5 {
        producer
            .produce(&topic, PARTITION_UA, json!({"name": format!("m{i}"), "count": i}), None)
            .unwrap();
    }

    for stream in &mut streams {
        let mut offsets = Vec::new();
        while let Some(msg) = stream.try_recv() {
            offsets.push(msg.offset);
        }
        assert_eq!(offsets, vec![0, 1, 2, 3, 4]);
    }
}

#[tokio::test]
async fn stream_opened_late_only_sees_later_messages() {
    let stub = initialized_stub().await;
    let consumer = stub.consumer(ConsumerOptions::default()).unwrap();
    let producer = stub.producer().unwrap();
    let topic = producer.topic(TOPIC);

    producer.produce(&topic, PARTITION_UA, json!({"name": "early", "count": 0}), None).unwrap();
    let mut stream = consumer.read_stream(TOPIC);
    producer.produce(&topic, PARTITION_UA, json!({"name": "late", "count": 1}), None).unwrap();

    let msg = stream.try_recv().unwrap();
    assert_eq!(msg.parsed["name"], "late");
    assert!(stream.try_recv().is_none());
}

#[tokio::test]
async fn missing_schema_is_reported_and_nothing_is_recorded() {
    let stub = initialized_stub().await;
    let consumer = stub.get_consumer(ConsumerOptions::default()).await.unwrap();
    let producer = stub.get_producer().await.unwrap();

    let (seen, listener) = collecting_listener();
    consumer.subscribe(&["unknownTopic"]);
    consumer.on_data(listener);
    let mut stream = consumer.get_read_stream("unknownTopic");

    let err = producer
        .produce(&producer.topic("unknownTopic"), PARTITION_UA, json!({}), None)
        .unwrap_err();

    assert!(matches!(err, StubError::MissingSchema(ref t) if t == "unknownTopic"));
    assert!(stub.messages_produced("unknownTopic").is_empty());
    assert_eq!(stub.high_watermark("unknownTopic"), None);
    assert!(seen.lock().unwrap().is_empty());
    assert!(stream.try_recv().is_none());
    assert_eq!(stub.produce_count(), 1);
}

#[tokio::test]
async fn encoding_failure_propagates_without_burning_an_offset() {
    let stub = initialized_stub().await;
    let producer = stub.get_producer().await.unwrap();
    let topic = producer.topic(TOPIC);

    let err = producer
        .produce(&topic, PARTITION_UA, json!({"name": "x", "count": "three"}), None)
        .unwrap_err();
    assert!(matches!(err, StubError::Encoding { .. }), "{err}");
    assert!(stub.messages_produced(TOPIC).is_empty());

    producer.produce(&topic, PARTITION_UA, json!({"name": "x", "count": 3}), None).unwrap();
    assert_eq!(stub.messages_produced(TOPIC)[0].offset, 0);
}

#[tokio::test]
async fn producing_to_one_subject_leaves_others_untouched() {
    let stub = initialized_stub().await;
    let producer = stub.get_producer().await.unwrap();

    producer
        .produce(&producer.topic(TOPIC), PARTITION_UA, json!({"name": "a", "count": 1}), None)
        .unwrap();

    assert_eq!(stub.high_watermark(TOPIC), Some(1));
    assert_eq!(stub.high_watermark("otherTopic"), None);
    assert_eq!(stub.produced_topics(), vec![TOPIC.to_string()]);
}

#[tokio::test]
async fn value_subject_naming_is_resolved() {
    let stub = BrokerStub::new(vec![RegistryFixture::new("orders-value", 1, 12, r#""long""#)]);
    stub.initialize().await.unwrap();
    let producer = stub.get_producer().await.unwrap();

    producer.produce(&producer.topic("orders"), 0, json!(99), None).unwrap();

    let msg = &stub.messages_produced("orders")[0];
    assert_eq!(&msg.payload[1..5], &12_i32.to_be_bytes());
}

#[test]
fn concurrent_producers_get_gap_free_offsets_in_delivery_order() {
    let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
    let stub = rt.block_on(initialized_stub());
    let consumer = stub.consumer(ConsumerOptions::default()).unwrap();
    let mut stream = consumer.read_stream(TOPIC);

    let (seen, listener) = collecting_listener();
    consumer.subscribe(&[TOPIC]);
    consumer.on_data(listener);

    std::thread::scope(|s| {
        for t in 0..4 {
            let producer = stub.producer().unwrap();
            s.spawn(move || {
                let topic = producer.topic(TOPIC);
                for i in 0..100 {
                    producer
                        .produce(&topic, t, json!({"name": format!("t{t}"), "count": i}), None)
                        .unwrap();
                }
            });
        }
    });

    let expected: Vec<i64> = (0..400).collect();

    let logged: Vec<i64> = stub.messages_produced(TOPIC).iter().map(|m| m.offset).collect();
    assert_eq!(logged, expected);

    let pushed: Vec<i64> = seen.lock().unwrap().iter().map(|m| m.offset).collect();
    assert_eq!(pushed, expected);

    let mut streamed = Vec::new();
    while let Some(msg) = stream.try_recv() {
        streamed.push(msg.offset);
    }
    assert_eq!(streamed, expected);
    assert_eq!(stub.produce_count(), 400);
}

#[tokio::test]
async fn listener_may_produce_to_its_own_topic_and_to_others() {
    let stub = BrokerStub::new(vec![
        RegistryFixture::new(TOPIC, 1, 1, test_schema()),
        RegistryFixture::new("audit", 1, 2, r#""string""#),
    ]);
    stub.initialize().await.unwrap();
    let consumer = stub.consumer(ConsumerOptions::default()).unwrap();
    let producer = Arc::new(stub.producer().unwrap());

    let order = Arc::new(Mutex::new(Vec::new()));
    let (log, echo) = (order.clone(), producer.clone());
    consumer.subscribe(&[TOPIC, "audit"]);
    consumer.on_data(Arc::new(move |msg: Arc<Message>| {
        log.lock().unwrap().push((msg.topic.clone(), msg.offset));
        if msg.topic != TOPIC {
            return;
        }
        let count = msg.parsed["count"].as_i64().unwrap_or_default();
        if count < 2 {
            let next = json!({"name": "echo", "count": count + 1});
            echo.produce(&echo.topic(TOPIC), PARTITION_UA, next, None).unwrap();
        }
        let audit = json!(msg.offset.to_string());
        echo.produce(&echo.topic("audit"), PARTITION_UA, audit, None).unwrap();
    }));

    producer
        .produce(&producer.topic(TOPIC), PARTITION_UA, json!({"name": "x", "count": 0}), None)
        .unwrap();

    let expected: Vec<(String, i64)> = [0, 1, 2]
        .into_iter()
        .flat_map(|o| [(TOPIC.to_string(), o), ("audit".to_string(), o)])
        .collect();
    assert_eq!(*order.lock().unwrap(), expected);

    let counts: Vec<_> = stub
        .messages_produced(TOPIC)
        .iter()
        .map(|m| m.parsed["count"].clone())
        .collect();
    assert_eq!(counts, vec![json!(0), json!(1), json!(2)]);
    let audited: Vec<_> = stub
        .messages_produced("audit")
        .iter()
        .map(|m| m.parsed.clone())
        .collect();
    assert_eq!(audited, vec![json!("0"), json!("1"), json!("2")]);
}

#[test]
fn listeners_producing_across_topics_from_two_threads_do_not_block() {
    let hop_schema = json!({
        "type": "record",
        "name": "Hop",
        "fields": [{"name": "hops", "type": "int"}]
    })
    .to_string();
    let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
    let stub = BrokerStub::new(vec![
        RegistryFixture::new("left", 1, 1, hop_schema.clone()),
        RegistryFixture::new("right", 1, 2, hop_schema),
    ]);
    rt.block_on(stub.initialize()).unwrap();

    let consumer = stub.consumer(ConsumerOptions::default()).unwrap();
    let relay = stub.producer().unwrap();
    let (delivered, listener) = collecting_listener();
    consumer.subscribe(&["left", "right"]);
    consumer.on_data(listener);
    consumer.on_data(Arc::new(move |msg: Arc<Message>| {
        let hops = msg.parsed["hops"].as_i64().unwrap_or_default();
        if hops < 2 {
            let other = if msg.topic == "left" { "right" } else { "left" };
            relay
                .produce(&relay.topic(other), PARTITION_UA, json!({"hops": hops + 1}), None)
                .unwrap();
        }
    }));

    std::thread::scope(|s| {
        for topic in ["left", "right"] {
            let producer = stub.producer().unwrap();
            s.spawn(move || {
                for _ in 0..50 {
                    producer
                        .produce(&producer.topic(topic), PARTITION_UA, json!({"hops": 0}), None)
                        .unwrap();
                }
            });
        }
    });

    for topic in ["left", "right"] {
        let offsets: Vec<i64> = stub.messages_produced(topic).iter().map(|m| m.offset).collect();
        assert_eq!(offsets, (0..150).collect::<Vec<i64>>(), "{topic}");
    }
    assert_eq!(delivered.lock().unwrap().len(), 300);
}

#[tokio::test]
async fn logical_type_fields_are_encoded_and_delivered() {
    let schema = json!({
        "type": "record",
        "name": "Event",
        "fields": [
            {"name": "at", "type": {"type": "long", "logicalType": "timestamp-millis"}},
            {"name": "day", "type": {"type": "int", "logicalType": "date"}},
            {"name": "id", "type": {"type": "string", "logicalType": "uuid"}}
        ]
    })
    .to_string();
    let stub = BrokerStub::new(vec![RegistryFixture::new("events", 1, 5, schema)]);
    stub.initialize().await.unwrap();
    let consumer = stub.get_consumer(ConsumerOptions::default()).await.unwrap();
    let producer = stub.get_producer().await.unwrap();
    let mut stream = consumer.get_read_stream("events");

    let value = json!({
        "at": 1_700_000_000_000_i64,
        "day": 19_675,
        "id": "6f1b2c3d-4e5f-4a6b-8c7d-9e0f1a2b3c4d"
    });
    producer
        .produce(&producer.topic("events"), PARTITION_UA, value.clone(), None)
        .unwrap();

    let msg = stream.try_recv().unwrap();
    assert_eq!(msg.parsed, value);
    let decoded = stub.schema("events").unwrap().codec.decode(&msg.payload).unwrap();
    assert_eq!(decoded, (5, value));
}

#[tokio::test]
async fn reused_named_type_is_encoded_end_to_end() {
    let schema = json!({
        "type": "record",
        "name": "Order",
        "namespace": "shop",
        "fields": [
            {"name": "ship", "type": {
                "type": "record",
                "name": "Addr",
                "fields": [{"name": "city", "type": "string"}]
            }},
            {"name": "bill", "type": "Addr"},
            {"name": "returns", "type": {"type": "array", "items": "shop.Addr"}}
        ]
    })
    .to_string();
    let stub = BrokerStub::new(vec![RegistryFixture::new("orders-value", 1, 9, schema)]);
    stub.initialize().await.unwrap();
    let producer = stub.get_producer().await.unwrap();

    let value = json!({
        "ship": {"city": "Oslo"},
        "bill": {"city": "Bergen"},
        "returns": [{"city": "Tromsø"}]
    });
    producer
        .produce(&producer.topic("orders"), 0, value.clone(), None)
        .unwrap();

    let msg = &stub.messages_produced("orders")[0];
    let decoded = stub.schema("orders-value").unwrap().codec.decode(&msg.payload).unwrap();
    assert_eq!(decoded, (9, value));

    let bad = json!({"ship": {"city": "a"}, "bill": 1, "returns": []});
    let err = producer
        .produce(&producer.topic("orders"), 0, bad, None)
        .unwrap_err();
    assert!(matches!(err, StubError::Encoding { .. }), "{err}");
}
