//! Avro boundary codec for the broker stub.
//!
//! Parses registry schema definitions and encodes JSON values into
//! registry-framed Avro payloads.

mod codec;
mod convert;

pub use codec::{AvroCodec, AvroSchemaParser, HEADER_LEN, MAGIC_BYTE, frame, unframe};
