use std::path::{Path, PathBuf};

use avrostub_api::{ConsumerOptions, RegistryFixture, StubError};
use serde::Deserialize;

use crate::runtime::BrokerStub;

/// Fixture configuration, parsed from TOML.
///
/// ```toml
/// [[fixtures]]
/// subject = "users"
/// id = 1
/// schema_path = "schemas/user.avsc"
///
/// [[fixtures]]
/// subject = "events"
/// id = 2
/// schema = { type = "record", name = "Event", fields = [{ name = "kind", type = "string" }] }
///
/// [consumer]
/// "group.id" = "replay"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StubConfig {
    #[serde(default)]
    pub fixtures: Vec<FixtureConfig>,

    /// Options for consumers created by tooling built on this config.
    #[serde(default)]
    pub consumer: ConsumerOptions,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureConfig {
    pub subject: String,
    #[serde(default = "default_version")]
    pub version: i32,
    pub id: i32,
    /// Inline schema: a JSON string or a TOML table/array mirroring it.
    #[serde(default)]
    pub schema: Option<toml::Value>,
    /// Schema file, relative to the config file's directory.
    #[serde(default)]
    pub schema_path: Option<PathBuf>,
}

fn default_version() -> i32 {
    1
}

impl FixtureConfig {
    /// Resolve into a registry fixture, reading `schema_path` if set.
    pub fn resolve(&self, base_dir: &Path) -> Result<RegistryFixture, StubError> {
        let schema = match (&self.schema, &self.schema_path) {
            (Some(_), Some(_)) => {
                return Err(StubError::Configuration(format!(
                    "fixture '{}': set either schema or schema_path, not both",
                    self.subject
                )));
            }
            (None, None) => {
                return Err(StubError::Configuration(format!(
                    "fixture '{}': schema or schema_path is required",
                    self.subject
                )));
            }
            (Some(toml::Value::String(text)), None) => text.clone(),
            (Some(inline), None) => serde_json::to_string(inline).map_err(|e| {
                StubError::Configuration(format!("fixture '{}': {e}", self.subject))
            })?,
            (None, Some(path)) => {
                let full = base_dir.join(path);
                std::fs::read_to_string(&full).map_err(|e| {
                    StubError::Configuration(format!(
                        "fixture '{}': cannot read {}: {e}",
                        self.subject,
                        full.display()
                    ))
                })?
            }
        };
        Ok(RegistryFixture::new(
            self.subject.clone(),
            self.version,
            self.id,
            schema,
        ))
    }
}

impl StubConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StubError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| StubError::Configuration(format!("{}: {e}", path.display())))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, StubError> {
        toml::from_str(toml_str).map_err(|e| StubError::Configuration(e.to_string()))
    }

    pub fn to_fixtures(&self, base_dir: &Path) -> Result<Vec<RegistryFixture>, StubError> {
        self.fixtures.iter().map(|f| f.resolve(base_dir)).collect()
    }

    /// Uninitialized stub staged with this config's fixtures.
    pub fn build_stub(&self, base_dir: &Path) -> Result<BrokerStub, StubError> {
        Ok(BrokerStub::new(self.to_fixtures(base_dir)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_table_schema_becomes_json() {
        let config = StubConfig::parse(
            r#"
            [[fixtures]]
            subject = "events"
            id = 2
            schema = { type = "record", name = "Event", fields = [{ name = "kind", type = "string" }] }

            [consumer]
            "group.id" = "replay"
            "#,
        )
        .unwrap();

        let fixtures = config.to_fixtures(Path::new(".")).unwrap();
        assert_eq!(fixtures.len(), 1);
        assert_eq!(fixtures[0].version, 1);
        let schema: serde_json::Value = serde_json::from_str(&fixtures[0].schema).unwrap();
        assert_eq!(schema["name"], "Event");
        assert_eq!(config.consumer.group_id.as_deref(), Some("replay"));
    }

    #[test]
    fn string_schema_is_kept_verbatim() {
        let config = StubConfig::parse(
            r#"
            [[fixtures]]
            subject = "names"
            version = 3
            id = 9
            schema = '"string"'
            "#,
        )
        .unwrap();
        let fixtures = config.to_fixtures(Path::new(".")).unwrap();
        assert_eq!(fixtures[0], RegistryFixture::new("names", 3, 9, "\"string\""));
    }

    #[test]
    fn fixture_needs_exactly_one_schema_source() {
        let config = StubConfig::parse(
            r#"
            [[fixtures]]
            subject = "orphan"
            id = 1
            "#,
        )
        .unwrap();
        let err = config.to_fixtures(Path::new(".")).unwrap_err();
        assert!(matches!(err, StubError::Configuration(_)));
    }

    #[test]
    fn missing_schema_file_is_a_configuration_error() {
        let config = StubConfig::parse(
            r#"
            [[fixtures]]
            subject = "users"
            id = 1
            schema_path = "does/not/exist.avsc"
            "#,
        )
        .unwrap();
        let err = config.build_stub(Path::new("/nonexistent")).err().unwrap();
        assert!(err.to_string().contains("users"), "{err}");
    }
}
