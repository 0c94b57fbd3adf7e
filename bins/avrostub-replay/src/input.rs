use std::path::Path;

use avrostub_api::PARTITION_UA;
use serde::Deserialize;

use crate::error::ReplayError;

/// One line of the replay input.
///
/// ```json
/// {"topic": "users", "value": {"name": "ann"}, "partition": 0, "key": "u-1"}
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InputRecord {
    pub topic: String,
    pub value: serde_json::Value,
    #[serde(default = "default_partition")]
    pub partition: i32,
    #[serde(default)]
    pub key: Option<String>,
}

fn default_partition() -> i32 {
    PARTITION_UA
}

pub fn read_records(path: &Path) -> Result<Vec<InputRecord>, ReplayError> {
    let content = std::fs::read_to_string(path).map_err(|source| ReplayError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_records(&content)
}

/// Parse JSON lines. Blank lines are skipped; line numbers are 1-based.
pub fn parse_records(content: &str) -> Result<Vec<InputRecord>, ReplayError> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|source| ReplayError::Input {
                line: idx + 1,
                source,
            })
        })
        .collect()
}

/// Topics in order of first appearance.
pub fn topics(records: &[InputRecord]) -> Vec<String> {
    let mut topics: Vec<String> = Vec::new();
    for record in records {
        if !topics.contains(&record.topic) {
            topics.push(record.topic.clone());
        }
    }
    topics
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_blank_lines() {
        let records = parse_records(
            r#"{"topic": "a", "value": 1}

{"topic": "b", "value": {"x": true}, "partition": 4, "key": "k"}
"#,
        )
        .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].partition, PARTITION_UA);
        assert_eq!(records[0].key, None);
        assert_eq!(records[1].partition, 4);
        assert_eq!(records[1].key.as_deref(), Some("k"));
    }

    #[test]
    fn bad_line_reports_its_number() {
        let err = parse_records("{\"topic\": \"a\", \"value\": 1}\n\nnot json\n").unwrap_err();
        assert!(matches!(err, ReplayError::Input { line: 3, .. }), "{err}");
    }

    #[test]
    fn topics_keep_first_appearance_order() {
        let records = parse_records(
            "{\"topic\":\"b\",\"value\":1}\n{\"topic\":\"a\",\"value\":1}\n{\"topic\":\"b\",\"value\":2}",
        )
        .unwrap();
        assert_eq!(topics(&records), vec!["b".to_string(), "a".to_string()]);
    }
}
