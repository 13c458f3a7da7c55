use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use docimport_lib::config::ImportConfig;
use docimport_lib::importer::{Actor, ImportNormalizer};

/// Shared state for CLI commands
pub struct App {
    pub normalizer: ImportNormalizer,
    pub actor: Actor,
}

impl App {
    /// Load the config (or defaults) and apply command-line overrides
    pub fn new(config_path: Option<&Path>, assets_dir: Option<PathBuf>, no_fetch: bool) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => ImportConfig::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => ImportConfig::default(),
        };

        if let Some(dir) = assets_dir {
            config.attachments.assets_dir = dir;
        }
        if no_fetch {
            config.attachments.fetch_remote = false;
        }

        let normalizer = ImportNormalizer::new(config)
            .context("Failed to set up the importer")?;

        Ok(Self {
            normalizer,
            actor: Actor::new(local_user_name()),
        })
    }
}

/// Name recorded as the importing actor
fn local_user_name() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "cli".to_string())
}
