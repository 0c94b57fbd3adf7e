//! Shared types and traits of the avrostub workspace.
//!
//! Application code written against `AvroClient` can be handed either a
//! real broker client adapter or the in-memory `BrokerStub` from
//! `avrostub-engine`.

pub mod client;
pub mod error;
pub mod fixture;
pub mod message;
pub mod options;
pub mod util;

pub use client::{
    AvroClient, AvroConsumer, AvroProducer, BoxFuture, CommitCallback, DataListener,
    EventListener, MessageStream, SchemaCodec, SchemaParser,
};
pub use error::{CodecError, CodecErrorKind, ErrorKind, StubError};
pub use fixture::RegistryFixture;
pub use message::{Message, PARTITION_UA, TopicHandle};
pub use options::ConsumerOptions;
pub use util::now_ms;
