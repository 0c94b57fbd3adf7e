use bytes::Bytes;

/// Partition value meaning "let the broker pick".
pub const PARTITION_UA: i32 = -1;

// ═══════════════════════════════════════════════════════════════
//  Message
// ═══════════════════════════════════════════════════════════════

/// A produced record as consumers see it.
///
/// Built once per `produce` call and shared as `Arc<Message>` between the
/// produced log and every stream or listener it is delivered to.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub topic: String,
    /// Framed payload: magic byte, schema id, Avro datum.
    pub payload: Bytes,
    /// The value handed to `produce`, untouched.
    pub parsed: serde_json::Value,
    pub offset: i64,
    /// Length of `payload` in bytes.
    pub size: usize,
    pub partition: i32,
    pub key: Option<Bytes>,
    pub timestamp_ms: i64,
}

impl Message {
    /// Key as UTF-8, if present and valid.
    pub fn key_str(&self) -> Option<&str> {
        self.key.as_deref().and_then(|k| std::str::from_utf8(k).ok())
    }
}

// ═══════════════════════════════════════════════════════════════
//  TopicHandle
// ═══════════════════════════════════════════════════════════════

/// Lightweight handle naming a topic to produce to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicHandle {
    name: String,
}

impl TopicHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl From<&str> for TopicHandle {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}
