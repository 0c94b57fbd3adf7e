use std::sync::Arc;

use apache_avro::Schema;
use avrostub_api::{CodecError, SchemaCodec, SchemaParser};
use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::convert::{Names, avro_to_value, collect_names, value_to_avro};

/// First byte of every registry-framed payload.
pub const MAGIC_BYTE: u8 = 0x00;

/// Magic byte + big-endian schema id.
pub const HEADER_LEN: usize = 5;

// ═══════════════════════════════════════════════════════════════
//  Framing
// ═══════════════════════════════════════════════════════════════

/// Prefix an Avro datum with the registry header.
///
/// Format: [magic_byte(1)][schema_id(4, BE)][datum(N)]
pub fn frame(schema_id: i32, datum: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + datum.len());
    buf.put_u8(MAGIC_BYTE);
    buf.put_i32(schema_id);
    buf.put_slice(datum);
    buf.freeze()
}

/// Split a framed payload into schema id and datum.
pub fn unframe(payload: &[u8]) -> Result<(i32, &[u8]), CodecError> {
    if payload.len() < HEADER_LEN {
        return Err(CodecError::decode(format!(
            "payload of {} bytes is shorter than the {HEADER_LEN}-byte header",
            payload.len()
        )));
    }
    if payload[0] != MAGIC_BYTE {
        return Err(CodecError::decode(format!(
            "invalid magic byte: expected 0x00, got 0x{:02x}",
            payload[0]
        )));
    }
    let mut id_bytes = &payload[1..HEADER_LEN];
    Ok((id_bytes.get_i32(), &payload[HEADER_LEN..]))
}

// ═══════════════════════════════════════════════════════════════
//  AvroCodec
// ═══════════════════════════════════════════════════════════════

/// Encoder for one parsed schema, with its named types resolved up front.
#[derive(Debug)]
pub struct AvroCodec {
    schema: Schema,
    names: Names,
}

impl AvroCodec {
    /// Fails if the schema references a named type it never declares.
    pub fn new(schema: Schema) -> Result<Self, CodecError> {
        let names = collect_names(&schema)?;
        Ok(Self { schema, names })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

impl SchemaCodec for AvroCodec {
    fn encode(&self, schema_id: i32, value: &serde_json::Value) -> Result<Bytes, CodecError> {
        let avro_value = value_to_avro(value, &self.schema, &self.names)?;
        let datum = apache_avro::to_avro_datum(&self.schema, avro_value)
            .map_err(|e| CodecError::encode(format!("avro encode: {e}")))?;
        Ok(frame(schema_id, &datum))
    }

    fn decode(&self, payload: &[u8]) -> Result<(i32, serde_json::Value), CodecError> {
        let (schema_id, mut datum) = unframe(payload)?;
        let avro_value = apache_avro::from_avro_datum(&self.schema, &mut datum, None)
            .map_err(|e| CodecError::decode(format!("avro decode: {e}")))?;
        Ok((schema_id, avro_to_value(&avro_value)?))
    }
}

// ═══════════════════════════════════════════════════════════════
//  AvroSchemaParser
// ═══════════════════════════════════════════════════════════════

/// Parses Avro JSON schema definitions into `AvroCodec`s.
#[derive(Debug, Default, Clone, Copy)]
pub struct AvroSchemaParser;

impl SchemaParser for AvroSchemaParser {
    fn parse(&self, definition: &str) -> Result<Arc<dyn SchemaCodec>, CodecError> {
        let schema = Schema::parse_str(definition)
            .map_err(|e| CodecError::parse(format!("avro: failed to parse schema: {e}")))?;
        Ok(Arc::new(AvroCodec::new(schema)?))
    }
}
