//! In-memory broker + schema registry double.
//!
//! `BrokerStub` mimics a schema-registry-backed Avro client: fixtures are
//! registered on `initialize`, producers encode values with the topic's
//! schema and assign per-topic offsets, and every produced message is
//! broadcast to the topic's read streams and, for subscribed topics, to
//! every `data` listener.
//!
//! ```ignore
//! let stub = BrokerStub::new(vec![RegistryFixture::new("users", 1, 1, USER_SCHEMA)]);
//! stub.initialize().await?;
//!
//! let consumer = stub.get_consumer(ConsumerOptions::with_group("g")).await?;
//! consumer.subscribe(&["users"]);
//! consumer.on_data(Arc::new(|msg| println!("{}", msg.parsed)));
//!
//! let producer = stub.get_producer().await?;
//! producer.produce(&producer.topic("users"), -1, json!({"name": "ann"}), None)?;
//! assert_eq!(stub.messages_produced("users").len(), 1);
//! ```

pub mod config;
pub mod consumer;
pub mod invocations;
mod lock;
pub mod log;
pub mod offsets;
pub mod producer;
pub mod router;
pub mod runtime;
pub mod schema;
pub mod stream;

pub use config::{FixtureConfig, StubConfig};
pub use consumer::Consumer;
pub use invocations::{CommitCall, InvocationLog, ProduceCall};
pub use producer::Producer;
pub use router::{DeliveryRouter, Routed};
pub use runtime::BrokerStub;
pub use schema::{SchemaEntry, SchemaStore};
pub use stream::ReadStream;
