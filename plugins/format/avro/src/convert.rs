use std::collections::HashMap;

use apache_avro::schema::{Name, ResolvedSchema};
use apache_avro::types::Value;
use apache_avro::{BigDecimal, Days, Decimal, Duration, Millis, Months, Schema, Uuid};
use avrostub_api::CodecError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value as Json;

/// Every named type of a parsed schema, by full name.
pub(crate) type Names = HashMap<Name, Schema>;

// ═══════════════════════════════════════════════════════════════
//  Avro → JSON
// ═══════════════════════════════════════════════════════════════

/// Render a decoded datum as the JSON shape `value_to_avro` accepts.
///
/// Bytes, fixed and decimals come back as base64 strings, unions as their
/// bare branch value, durations as `{months, days, millis}`.
pub(crate) fn avro_to_value(value: &Value) -> Result<Json, CodecError> {
    let json = match value {
        Value::Null => Json::Null,
        Value::Boolean(b) => Json::Bool(*b),
        Value::Int(n) | Value::Date(n) | Value::TimeMillis(n) => Json::from(*n),
        Value::Long(n)
        | Value::TimeMicros(n)
        | Value::TimestampMillis(n)
        | Value::TimestampMicros(n)
        | Value::TimestampNanos(n)
        | Value::LocalTimestampMillis(n)
        | Value::LocalTimestampMicros(n)
        | Value::LocalTimestampNanos(n) => Json::from(*n),
        Value::Float(f) => Json::from(*f),
        Value::Double(d) => Json::from(*d),
        Value::Bytes(b) | Value::Fixed(_, b) => Json::String(BASE64.encode(b)),
        Value::String(s) | Value::Enum(_, s) => Json::String(s.clone()),
        Value::Uuid(u) => Json::String(u.to_string()),
        Value::BigDecimal(d) => Json::String(d.to_string()),
        Value::Decimal(d) => {
            let bytes = Vec::<u8>::try_from(d)
                .map_err(|e| CodecError::decode(format!("decimal: {e}")))?;
            Json::String(BASE64.encode(bytes))
        }
        Value::Duration(d) => serde_json::json!({
            "months": u32::from(d.months()),
            "days": u32::from(d.days()),
            "millis": u32::from(d.millis()),
        }),
        Value::Union(_, inner) => avro_to_value(inner)?,
        Value::Array(items) => Json::Array(
            items
                .iter()
                .map(avro_to_value)
                .collect::<Result<_, _>>()?,
        ),
        Value::Map(entries) => Json::Object(
            entries
                .iter()
                .map(|(k, v)| Ok((k.clone(), avro_to_value(v)?)))
                .collect::<Result<_, CodecError>>()?,
        ),
        Value::Record(fields) => Json::Object(
            fields
                .iter()
                .map(|(k, v)| Ok((k.clone(), avro_to_value(v)?)))
                .collect::<Result<_, CodecError>>()?,
        ),
    };
    Ok(json)
}

// ═══════════════════════════════════════════════════════════════
//  JSON → Avro
// ═══════════════════════════════════════════════════════════════

/// Convert `val` into an Avro value shaped by `schema`.
///
/// Strict: anything that does not fit the schema is an error. `names`
/// holds every named type of the enclosing schema and resolves
/// `Schema::Ref`.
pub(crate) fn value_to_avro(
    val: &Json,
    schema: &Schema,
    names: &Names,
) -> Result<Value, CodecError> {
    match (val, schema) {
        (Json::Null, Schema::Null) => Ok(Value::Null),
        (Json::Bool(b), Schema::Boolean) => Ok(Value::Boolean(*b)),

        (Json::Number(_), Schema::Int) => as_int(val, schema).map(Value::Int),
        (Json::Number(_), Schema::Date) => as_int(val, schema).map(Value::Date),
        (Json::Number(_), Schema::TimeMillis) => as_int(val, schema).map(Value::TimeMillis),
        (Json::Number(_), Schema::Long) => as_long(val, schema).map(Value::Long),
        (Json::Number(_), Schema::TimeMicros) => as_long(val, schema).map(Value::TimeMicros),
        (Json::Number(_), Schema::TimestampMillis) => {
            as_long(val, schema).map(Value::TimestampMillis)
        }
        (Json::Number(_), Schema::TimestampMicros) => {
            as_long(val, schema).map(Value::TimestampMicros)
        }
        (Json::Number(_), Schema::TimestampNanos) => {
            as_long(val, schema).map(Value::TimestampNanos)
        }
        (Json::Number(_), Schema::LocalTimestampMillis) => {
            as_long(val, schema).map(Value::LocalTimestampMillis)
        }
        (Json::Number(_), Schema::LocalTimestampMicros) => {
            as_long(val, schema).map(Value::LocalTimestampMicros)
        }
        (Json::Number(_), Schema::LocalTimestampNanos) => {
            as_long(val, schema).map(Value::LocalTimestampNanos)
        }
        (Json::Number(n), Schema::Float) => n
            .as_f64()
            .map(|f| Value::Float(f as f32))
            .ok_or_else(|| mismatch(val, schema)),
        (Json::Number(n), Schema::Double) => {
            n.as_f64().map(Value::Double).ok_or_else(|| mismatch(val, schema))
        }

        (Json::String(s), Schema::String) => Ok(Value::String(s.clone())),
        (Json::String(s), Schema::Uuid) => Uuid::parse_str(s)
            .map(Value::Uuid)
            .map_err(|e| CodecError::encode(format!("'{s}' is not a uuid: {e}"))),
        (Json::String(s), Schema::Bytes) => base64_bytes(s).map(Value::Bytes),
        (Json::String(s), Schema::Fixed(fixed)) => {
            let bytes = base64_bytes(s)?;
            if bytes.len() != fixed.size {
                return Err(CodecError::encode(format!(
                    "fixed {} takes {} bytes, got {}",
                    display_name(&fixed.name),
                    fixed.size,
                    bytes.len()
                )));
            }
            Ok(Value::Fixed(fixed.size, bytes))
        }
        (Json::String(s), Schema::Decimal(_)) => {
            base64_bytes(s).map(|bytes| Value::Decimal(Decimal::from(bytes)))
        }
        (Json::String(_) | Json::Number(_), Schema::BigDecimal) => {
            let text = match val {
                Json::String(s) => s.clone(),
                other => other.to_string(),
            };
            text.parse::<BigDecimal>()
                .map(Value::BigDecimal)
                .map_err(|e| CodecError::encode(format!("'{text}' is not a decimal: {e}")))
        }
        (Json::Object(map), Schema::Duration) => {
            let part = |key: &str| {
                map.get(key)
                    .and_then(Json::as_u64)
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| CodecError::encode(format!("duration needs a u32 '{key}'")))
            };
            Ok(Value::Duration(Duration::new(
                Months::new(part("months")?),
                Days::new(part("days")?),
                Millis::new(part("millis")?),
            )))
        }

        (Json::String(s), Schema::Enum(enum_schema)) => enum_schema
            .symbols
            .iter()
            .position(|sym| sym == s)
            .map(|idx| Value::Enum(idx as u32, s.clone()))
            .ok_or_else(|| {
                CodecError::encode(format!(
                    "'{s}' is not a symbol of enum {}",
                    display_name(&enum_schema.name)
                ))
            }),
        (Json::Array(items), Schema::Array(inner)) => items
            .iter()
            .map(|item| value_to_avro(item, &inner.items, names))
            .collect::<Result<_, _>>()
            .map(Value::Array),
        (Json::Object(map), Schema::Map(inner)) => {
            let mut entries = HashMap::with_capacity(map.len());
            for (k, v) in map {
                let converted =
                    value_to_avro(v, &inner.types, names).map_err(|e| e.with_context(k))?;
                entries.insert(k.clone(), converted);
            }
            Ok(Value::Map(entries))
        }
        (Json::Object(map), Schema::Record(record)) => {
            let mut fields = Vec::with_capacity(record.fields.len());
            for field in &record.fields {
                let converted = match (map.get(&field.name), &field.default) {
                    (Some(v), _) => value_to_avro(v, &field.schema, names),
                    (None, Some(default)) => value_to_avro(default, &field.schema, names),
                    (None, None) => Err(CodecError::encode(format!(
                        "missing field '{}'",
                        field.name
                    ))),
                }
                .map_err(|e| e.with_context(display_name(&record.name)))?;
                fields.push((field.name.clone(), converted));
            }
            Ok(Value::Record(fields))
        }
        (_, Schema::Union(union)) => {
            let variants = union.variants();

            // Wrapped form: {"<branch>": value}
            if let Json::Object(map) = val {
                if let (1, Some((branch, inner))) = (map.len(), map.iter().next()) {
                    let hit = variants
                        .iter()
                        .enumerate()
                        .find(|(_, v)| branch_names(v).iter().any(|n| n == branch));
                    if let Some((idx, variant)) = hit {
                        let v = value_to_avro(inner, variant, names)?;
                        return Ok(Value::Union(idx as u32, Box::new(v)));
                    }
                }
            }

            variants
                .iter()
                .enumerate()
                .find_map(|(idx, variant)| {
                    value_to_avro(val, variant, names)
                        .ok()
                        .map(|v| Value::Union(idx as u32, Box::new(v)))
                })
                .ok_or_else(|| {
                    CodecError::encode(format!("cannot convert {val} to any union branch"))
                })
        }
        (_, Schema::Ref { name }) => value_to_avro(val, resolve_ref(name, names)?, names),
        _ => Err(mismatch(val, schema)),
    }
}

/// Named types declared anywhere in `schema`.
pub(crate) fn collect_names(schema: &Schema) -> Result<Names, CodecError> {
    let resolved = ResolvedSchema::try_from(schema)
        .map_err(|e| CodecError::parse(format!("avro: unresolved named type: {e}")))?;
    Ok(resolved
        .get_names()
        .iter()
        .map(|(name, schema)| (name.clone(), (*schema).clone()))
        .collect())
}

fn resolve_ref<'a>(name: &Name, names: &'a Names) -> Result<&'a Schema, CodecError> {
    names
        .get(name)
        .or_else(|| {
            names
                .iter()
                .find(|(known, _)| known.name == name.name)
                .map(|(_, schema)| schema)
        })
        .ok_or_else(|| {
            CodecError::encode(format!("unknown named type {}", display_name(name)))
        })
}

fn as_int(val: &Json, schema: &Schema) -> Result<i32, CodecError> {
    val.as_i64()
        .and_then(|i| i32::try_from(i).ok())
        .ok_or_else(|| mismatch(val, schema))
}

fn as_long(val: &Json, schema: &Schema) -> Result<i64, CodecError> {
    val.as_i64().ok_or_else(|| mismatch(val, schema))
}

fn base64_bytes(s: &str) -> Result<Vec<u8>, CodecError> {
    BASE64
        .decode(s)
        .map_err(|e| CodecError::encode(format!("bytes must be base64: {e}")))
}

fn mismatch(val: &Json, schema: &Schema) -> CodecError {
    CodecError::encode(format!("value {val} does not match schema {}", type_name(schema)))
}

fn display_name(name: &Name) -> String {
    match &name.namespace {
        Some(ns) if !ns.is_empty() => format!("{ns}.{}", name.name),
        _ => name.name.clone(),
    }
}

/// Names a union branch may be addressed by in the wrapped form.
fn branch_names(schema: &Schema) -> Vec<String> {
    match schema {
        Schema::Record(r) => vec![r.name.name.clone(), display_name(&r.name)],
        Schema::Enum(e) => vec![e.name.name.clone(), display_name(&e.name)],
        Schema::Fixed(f) => vec![f.name.name.clone(), display_name(&f.name)],
        Schema::Ref { name } => vec![name.name.clone(), display_name(name)],
        other => vec![type_name(other).to_string()],
    }
}

/// Avro type name; logical types report their underlying type.
fn type_name(schema: &Schema) -> &'static str {
    match schema {
        Schema::Null => "null",
        Schema::Boolean => "boolean",
        Schema::Int | Schema::Date | Schema::TimeMillis => "int",
        Schema::Long
        | Schema::TimeMicros
        | Schema::TimestampMillis
        | Schema::TimestampMicros
        | Schema::TimestampNanos
        | Schema::LocalTimestampMillis
        | Schema::LocalTimestampMicros
        | Schema::LocalTimestampNanos => "long",
        Schema::Float => "float",
        Schema::Double => "double",
        Schema::Bytes | Schema::BigDecimal => "bytes",
        Schema::Decimal(d) => match *d.inner {
            Schema::Fixed(_) => "fixed",
            _ => "bytes",
        },
        Schema::String | Schema::Uuid => "string",
        Schema::Array(_) => "array",
        Schema::Map(_) => "map",
        Schema::Union(_) => "union",
        Schema::Record(_) => "record",
        Schema::Enum(_) => "enum",
        Schema::Fixed(_) | Schema::Duration => "fixed",
        Schema::Ref { .. } => "ref",
    }
}
