use std::path::{Path, PathBuf};

use anyhow::Context;
use quill_anchor::LedgerConfig;
use quill_sdk::ServiceConfig;
use quill_server::ServerConfig;
use serde::{Deserialize, Serialize};

/// Where documents and their versions are kept.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub database_path: PathBuf,
    pub blob_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("quill-data/quill.db"),
            blob_dir: PathBuf::from("quill-data/blobs"),
        }
    }
}

/// Contents of `quill.toml`. Every section is optional.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuillConfig {
    pub server: ServerConfig,
    pub ledger: LedgerConfig,
    pub store: StoreConfig,
    pub service: ServiceConfig,
}

impl QuillConfig {
    /// Load from `path`, or fall back to defaults when the file is absent.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        toml::to_string_pretty(self).context("serializing config")
    }
}
