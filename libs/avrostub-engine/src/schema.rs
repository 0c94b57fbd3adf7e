use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use avrostub_api::{RegistryFixture, SchemaCodec, SchemaParser, StubError};

use crate::lock;

/// Suffix of the registry's value subject for a topic.
pub const VALUE_SUBJECT_SUFFIX: &str = "-value";

// ═══════════════════════════════════════════════════════════════
//  SchemaEntry
// ═══════════════════════════════════════════════════════════════

/// A parsed schema plus its registry metadata.
pub struct SchemaEntry {
    pub subject: String,
    pub version: i32,
    pub id: i32,
    pub codec: Arc<dyn SchemaCodec>,
}

impl fmt::Debug for SchemaEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaEntry")
            .field("subject", &self.subject)
            .field("version", &self.version)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

// ═══════════════════════════════════════════════════════════════
//  SchemaStore
// ═══════════════════════════════════════════════════════════════

/// Subject-keyed store of parsed schemas.
pub struct SchemaStore {
    parser: Arc<dyn SchemaParser>,
    entries: RwLock<HashMap<String, Arc<SchemaEntry>>>,
}

impl SchemaStore {
    pub fn new(parser: Arc<dyn SchemaParser>) -> Self {
        Self {
            parser,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Parse and store `fixtures` in order, overwriting existing subjects.
    ///
    /// Stops at the first unparsable schema. Fixtures before it stay
    /// registered; nothing is rolled back.
    pub fn register(&self, fixtures: &[RegistryFixture]) -> Result<(), StubError> {
        for fixture in fixtures {
            let codec = self.parser.parse(&fixture.schema).map_err(|source| {
                tracing::error!(subject = %fixture.subject, error = %source, "error parsing schema");
                StubError::Schema {
                    subject: fixture.subject.clone(),
                    source,
                }
            })?;

            let entry = Arc::new(SchemaEntry {
                subject: fixture.subject.clone(),
                version: fixture.version,
                id: fixture.id,
                codec,
            });
            let previous = lock::write(&self.entries, "schema store")
                .insert(fixture.subject.clone(), entry);

            tracing::debug!(
                subject = %fixture.subject,
                id = fixture.id,
                version = fixture.version,
                replaced = previous.is_some(),
                "schema registered"
            );
        }
        Ok(())
    }

    pub fn lookup(&self, subject: &str) -> Option<Arc<SchemaEntry>> {
        lock::read(&self.entries, "schema store").get(subject).cloned()
    }

    /// Schema used for values produced to `topic`: the subject named like
    /// the topic, else `<topic>-value`.
    pub fn resolve_topic(&self, topic: &str) -> Option<Arc<SchemaEntry>> {
        let entries = lock::read(&self.entries, "schema store");
        entries
            .get(topic)
            .or_else(|| entries.get(&format!("{topic}{VALUE_SUBJECT_SUFFIX}")))
            .cloned()
    }

    pub fn subjects(&self) -> Vec<String> {
        let mut subjects: Vec<String> =
            lock::read(&self.entries, "schema store").keys().cloned().collect();
        subjects.sort();
        subjects
    }

    /// All entries, sorted by subject.
    pub fn entries(&self) -> Vec<Arc<SchemaEntry>> {
        let mut entries: Vec<Arc<SchemaEntry>> =
            lock::read(&self.entries, "schema store").values().cloned().collect();
        entries.sort_by(|a, b| a.subject.cmp(&b.subject));
        entries
    }

    pub fn len(&self) -> usize {
        lock::read(&self.entries, "schema store").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
