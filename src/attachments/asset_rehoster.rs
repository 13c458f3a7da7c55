//! Stores inline images under the assets directory.
//!
//! Embedded `data:` images are decoded and remote `http(s)` images are
//! downloaded. Files are content-addressed (`<sha256>.<ext>`) in a
//! per-actor folder, each with a JSON sidecar describing where it came from.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use regex::{Captures, Regex};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use uuid::Uuid;

use super::{AttachmentRehoster, RehostError};
use crate::config::AttachmentConfig;
use crate::importer::{Actor, ImportScope};

fn image_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"!\[(?P<alt>[^\]]*)\]\((?P<url>[^)\s]+)(?P<title>\s+"[^"]*")?\)"#)
            .expect("valid image regex")
    })
}

fn data_uri_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^data:(?P<mime>[\w.+-]+/[\w.+-]+)?(?:;[^,;]+)*;base64,(?P<data>.*)$")
            .expect("valid data uri regex")
    })
}

/// Metadata written next to every stored attachment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRecord {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
    /// Original link, or `data:<mime>` for embedded images.
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<ImportScope>,
    pub created_at: DateTime<Utc>,
}

enum ImageSource<'a> {
    Embedded { mime: Option<&'a str>, data: &'a str },
    Remote { url: &'a str },
}

impl fmt::Display for ImageSource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::Embedded { mime, .. } => {
                write!(f, "data:{}", mime.unwrap_or("application/octet-stream"))
            }
            ImageSource::Remote { url } => f.write_str(url),
        }
    }
}

struct Payload {
    bytes: Vec<u8>,
    content_type: String,
}

pub struct AssetRehoster {
    config: AttachmentConfig,
    client: Client,
}

impl AssetRehoster {
    pub fn new(config: AttachmentConfig) -> Result<Self, RehostError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
            .build()?;

        Ok(Self { config, client })
    }

    pub fn assets_dir(&self) -> &Path {
        &self.config.assets_dir
    }

    /// Decide what a link points at; `None` means leave it alone.
    fn classify<'a>(&self, url: &'a str) -> Option<ImageSource<'a>> {
        if url.starts_with(&self.config.url_prefix) {
            return None;
        }
        if url.starts_with("data:") {
            return match data_uri_regex().captures(url) {
                Some(caps) => Some(ImageSource::Embedded {
                    mime: caps.name("mime").map(|m| m.as_str()),
                    data: caps.name("data").map(|m| m.as_str()).unwrap_or(""),
                }),
                None => {
                    log::warn!("Skipping data URI image that is not base64 encoded");
                    None
                }
            };
        }
        if url.starts_with("http://") || url.starts_with("https://") {
            if self.config.fetch_remote {
                return Some(ImageSource::Remote { url });
            }
            log::debug!("Remote fetch disabled, keeping {}", url);
        }
        None
    }

    async fn load(&self, source: &ImageSource<'_>) -> Result<Payload, RehostError> {
        match source {
            ImageSource::Embedded { mime, data } => {
                let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(cleaned.as_bytes())
                    .map_err(|e| RehostError::InvalidData {
                        source_desc: source.to_string(),
                        reason: e.to_string(),
                    })?;
                self.check_size(source, bytes.len() as u64)?;
                Ok(Payload {
                    bytes,
                    content_type: mime.unwrap_or("application/octet-stream").to_string(),
                })
            }
            ImageSource::Remote { url } => self.download(source, url).await,
        }
    }

    async fn download(&self, source: &ImageSource<'_>, url: &str) -> Result<Payload, RehostError> {
        let response = self.client.get(url).send().await?.error_for_status()?;

        if let Some(length) = response.content_length() {
            self.check_size(source, length)?;
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            bytes.extend_from_slice(&chunk);
            self.check_size(source, bytes.len() as u64)?;
        }

        Ok(Payload {
            bytes,
            content_type,
        })
    }

    fn check_size(&self, source: &ImageSource<'_>, size: u64) -> Result<(), RehostError> {
        if size > self.config.max_attachment_size {
            return Err(RehostError::TooLarge {
                source_desc: source.to_string(),
                size,
                limit: self.config.max_attachment_size,
            });
        }
        Ok(())
    }

    /// Write the payload (once per distinct content) and return its new link.
    async fn store(
        &self,
        source: &ImageSource<'_>,
        payload: Payload,
        actor: &Actor,
        ip: Option<&str>,
        scope: Option<&ImportScope>,
    ) -> Result<String, RehostError> {
        let hash = hex::encode(Sha256::digest(&payload.bytes));
        let extension = extension_for(&payload.content_type, source);
        let file_name = format!("{}.{}", hash, extension);

        let actor_dir = self.config.assets_dir.join(actor.id.to_string());
        fs::create_dir_all(&actor_dir).await?;

        // The sidecar is written last and marks the attachment as complete.
        let target_path = actor_dir.join(&file_name);
        let sidecar_path = record_path(&target_path);
        if fs::try_exists(&sidecar_path).await? {
            log::debug!("Attachment {} already stored", file_name);
        } else {
            fs::write(&target_path, &payload.bytes).await?;

            let record = AttachmentRecord {
                id: Uuid::new_v4(),
                actor_id: actor.id,
                file_name: file_name.clone(),
                content_type: payload.content_type,
                size: payload.bytes.len() as u64,
                source: source.to_string(),
                ip: ip.map(str::to_string),
                scope: scope.copied(),
                created_at: Utc::now(),
            };
            let record_json = serde_json::to_string_pretty(&record)?;
            if let Err(e) = fs::write(&sidecar_path, record_json).await {
                if let Err(cleanup) = fs::remove_file(&target_path).await {
                    log::warn!("Could not remove orphaned attachment {}: {}", file_name, cleanup);
                }
                return Err(e.into());
            }
            log::debug!("Stored attachment {} from {}", file_name, source);
        }

        Ok(format!(
            "{}/{}/{}",
            self.config.url_prefix.trim_end_matches('/'),
            actor.id,
            file_name
        ))
    }
}

fn record_path(attachment: &Path) -> PathBuf {
    let mut name = attachment.as_os_str().to_owned();
    name.push(".json");
    PathBuf::from(name)
}

fn extension_for(content_type: &str, source: &ImageSource<'_>) -> String {
    let from_mime = match content_type {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/svg+xml" => Some("svg"),
        "image/bmp" => Some("bmp"),
        "image/tiff" => Some("tiff"),
        _ => None,
    };
    if let Some(ext) = from_mime {
        return ext.to_string();
    }

    if let ImageSource::Remote { url } = source {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let ext = Path::new(path)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .filter(|e| !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()));
        if let Some(ext) = ext {
            return ext;
        }
    }

    "bin".to_string()
}

#[async_trait]
impl AttachmentRehoster for AssetRehoster {
    async fn rehost(
        &self,
        text: &str,
        actor: &Actor,
        ip: Option<&str>,
        scope: Option<&ImportScope>,
    ) -> Result<String, RehostError> {
        let urls: Vec<String> = image_regex()
            .captures_iter(text)
            .map(|caps| caps["url"].to_string())
            .collect();

        let mut replacements: HashMap<String, String> = HashMap::new();
        for url in &urls {
            if replacements.contains_key(url) {
                continue;
            }
            let Some(source) = self.classify(url) else {
                continue;
            };
            let payload = self.load(&source).await?;
            let new_url = self.store(&source, payload, actor, ip, scope).await?;
            replacements.insert(url.to_string(), new_url);
        }

        if replacements.is_empty() {
            return Ok(text.to_string());
        }

        log::debug!("Rehosted {} image(s) for {}", replacements.len(), actor.id);

        let rewritten = image_regex().replace_all(text, |caps: &Captures| {
            match replacements.get(&caps["url"]) {
                Some(new_url) => format!(
                    "![{}]({}{})",
                    &caps["alt"],
                    new_url,
                    caps.name("title").map(|m| m.as_str()).unwrap_or("")
                ),
                None => caps[0].to_string(),
            }
        });

        Ok(rewritten.into_owned())
    }
}
