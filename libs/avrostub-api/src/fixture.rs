use serde::{Deserialize, Serialize};

/// Static description of one schema registration, as a registry would
/// return it for a subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryFixture {
    /// Registry subject; producing to a topic resolves the subject of the
    /// same name (or `<topic>-value`).
    pub subject: String,
    pub version: i32,
    /// Registry id written into every payload's header.
    pub id: i32,
    /// Serialized schema definition (Avro JSON).
    pub schema: String,
}

impl RegistryFixture {
    pub fn new(
        subject: impl Into<String>,
        version: i32,
        id: i32,
        schema: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            version,
            id,
            schema: schema.into(),
        }
    }
}
