use std::fmt;

use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

/// The user performing the import.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub id: Uuid,
    pub name: String,
}

impl Actor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

/// Opaque handle for the caller's persistence scope (e.g. a transaction).
///
/// The importer never opens or commits it; it is only passed through to the
/// attachment rehoster.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ImportScope(pub Uuid);

impl ImportScope {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ImportScope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ImportScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Raw uploaded content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportContent {
    Bytes(Bytes),
    Text(String),
}

impl ImportContent {
    /// The content as UTF-8 text, failing on invalid sequences.
    pub fn as_text(&self) -> Result<&str, std::str::Utf8Error> {
        match self {
            ImportContent::Bytes(bytes) => std::str::from_utf8(bytes),
            ImportContent::Text(text) => Ok(text),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ImportContent::Bytes(bytes) => bytes.len(),
            ImportContent::Text(text) => text.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<String> for ImportContent {
    fn from(text: String) -> Self {
        ImportContent::Text(text)
    }
}

impl From<&str> for ImportContent {
    fn from(text: &str) -> Self {
        ImportContent::Text(text.to_string())
    }
}

impl From<Vec<u8>> for ImportContent {
    fn from(bytes: Vec<u8>) -> Self {
        ImportContent::Bytes(Bytes::from(bytes))
    }
}

impl From<Bytes> for ImportContent {
    fn from(bytes: Bytes) -> Self {
        ImportContent::Bytes(bytes)
    }
}

#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub actor: Actor,
    pub mime_type: String,
    pub file_name: String,
    pub content: ImportContent,
    /// Network address the upload came from.
    pub ip: Option<String>,
    pub scope: Option<ImportScope>,
}

impl ImportRequest {
    pub fn new(
        actor: Actor,
        mime_type: impl Into<String>,
        file_name: impl Into<String>,
        content: impl Into<ImportContent>,
    ) -> Self {
        Self {
            actor,
            mime_type: mime_type.into(),
            file_name: file_name.into(),
            content: content.into(),
            ip: None,
            scope: None,
        }
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn with_scope(mut self, scope: ImportScope) -> Self {
        self.scope = Some(scope);
        self
    }
}

/// Normalized document ready to be stored.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    pub text: String,
    pub title: String,
    #[serde(serialize_with = "serialize_base64")]
    pub state: Vec<u8>,
}

fn serialize_base64<S: Serializer>(state: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(state))
}
