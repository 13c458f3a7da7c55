//! Import limits and attachment settings.
//!
//! Loaded from a TOML file; every key is optional and falls back to the
//! defaults below.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest title kept on an imported document, in characters.
pub const DEFAULT_MAX_TITLE_LENGTH: usize = 100;
/// Largest encoded document state accepted, in bytes.
pub const DEFAULT_MAX_STATE_LENGTH: usize = 1500 * 1024;
/// Largest single image accepted while rehoming attachments, in bytes.
pub const DEFAULT_MAX_ATTACHMENT_SIZE: u64 = 25 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "snake_case")]
pub struct ImportConfig {
    pub max_title_length: usize,
    pub max_state_length: usize,
    pub attachments: AttachmentConfig,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_title_length: DEFAULT_MAX_TITLE_LENGTH,
            max_state_length: DEFAULT_MAX_STATE_LENGTH,
            attachments: AttachmentConfig::default(),
        }
    }
}

/// Where rehomed images are written and how they are linked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "snake_case")]
pub struct AttachmentConfig {
    pub assets_dir: PathBuf,
    /// Prefix of rewritten image links; links already under it are left alone.
    pub url_prefix: String,
    /// Download `http(s)` images. When off, remote links are kept as-is.
    pub fetch_remote: bool,
    pub max_attachment_size: u64,
    pub timeout_secs: u64,
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            assets_dir: default_assets_dir(),
            url_prefix: "/api/attachments".to_string(),
            fetch_remote: true,
            max_attachment_size: DEFAULT_MAX_ATTACHMENT_SIZE,
            timeout_secs: 30,
        }
    }
}

fn default_assets_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("docimport")
        .join("attachments")
}

impl ImportConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: ImportConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // Room for at least one character plus the ellipsis.
        if self.max_title_length < 4 {
            return Err(ConfigError::Invalid {
                key: "max_title_length",
                message: format!("must be at least 4, got {}", self.max_title_length),
            });
        }
        if self.max_state_length == 0 {
            return Err(ConfigError::Invalid {
                key: "max_state_length",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.attachments.max_attachment_size == 0 {
            return Err(ConfigError::Invalid {
                key: "attachments.max_attachment_size",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.attachments.url_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "attachments.url_prefix",
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
