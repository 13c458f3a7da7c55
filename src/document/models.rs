use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Block format version written into every imported document.
pub const EDITOR_VERSION: &str = "2.28.0";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EditorBlock {
    pub id: String,
    #[serde(rename = "type")]
    pub block_type: String,
    pub data: serde_json::Value,
}

/// The document tree: an ordered list of typed blocks plus metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EditorData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub blocks: Vec<EditorBlock>,
}

impl EditorData {
    pub fn with_blocks(blocks: Vec<EditorBlock>) -> Self {
        Self {
            time: Some(Utc::now().timestamp_millis()),
            version: Some(EDITOR_VERSION.to_string()),
            blocks,
        }
    }

    /// Block types in document order.
    pub fn block_types(&self) -> Vec<&str> {
        self.blocks.iter().map(|b| b.block_type.as_str()).collect()
    }
}

impl Default for EditorData {
    fn default() -> Self {
        Self::with_blocks(Vec::new())
    }
}
