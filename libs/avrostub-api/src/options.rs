use serde::{Deserialize, Serialize};

/// Consumer configuration bag.
///
/// Accepted and kept for inspection; the stub enforces none of it.
/// Keys other than the two known ones land in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsumerOptions {
    #[serde(rename = "group.id", alias = "group_id", default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,

    #[serde(
        rename = "enable.auto.commit",
        alias = "auto_commit",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub auto_commit: Option<bool>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ConsumerOptions {
    pub fn with_group(group_id: impl Into<String>) -> Self {
        Self {
            group_id: Some(group_id.into()),
            ..Self::default()
        }
    }
}
