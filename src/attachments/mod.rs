//! Rehoming of inline images as managed attachments.

mod asset_rehoster;

use async_trait::async_trait;
use thiserror::Error;

use crate::importer::{Actor, ImportScope};

pub use asset_rehoster::{AssetRehoster, AttachmentRecord};

#[derive(Error, Debug)]
pub enum RehostError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid image data in {source_desc}: {reason}")]
    InvalidData { source_desc: String, reason: String },
    #[error("Image {source_desc} is too large ({size} bytes, limit {limit})")]
    TooLarge {
        source_desc: String,
        size: u64,
        limit: u64,
    },
}

/// Rewrites image links in markdown to point at managed attachments.
///
/// Implementations may upload or store files as a side effect.
#[async_trait]
pub trait AttachmentRehoster: Send + Sync {
    async fn rehost(
        &self,
        text: &str,
        actor: &Actor,
        ip: Option<&str>,
        scope: Option<&ImportScope>,
    ) -> Result<String, RehostError>;
}

/// Leaves every link untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRehoster;

#[async_trait]
impl AttachmentRehoster for NoopRehoster {
    async fn rehost(
        &self,
        text: &str,
        _actor: &Actor,
        _ip: Option<&str>,
        _scope: Option<&ImportScope>,
    ) -> Result<String, RehostError> {
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_rehoster_returns_text() {
        let text = "![a](https://example.com/a.png)";
        let result = NoopRehoster
            .rehost(text, &Actor::new("ada"), None, None)
            .await
            .unwrap();
        assert_eq!(result, text);
    }
}
