//! TOML configuration file: `[memory]`, `[storage]` and `[assets]` tables.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use highway_core::{MemoryConfig, SegmenterBackend};

use crate::error::{Result, StoreError};

pub const DEFAULT_DB_FILE: &str = "highway.db";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    /// Nothing touches disk; every run starts empty.
    Memory,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub path: PathBuf,
    /// Write the tables back after every mutating command.
    pub auto_save: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            path: PathBuf::from(DEFAULT_DB_FILE),
            auto_save: true,
        }
    }
}

/// Optional asset files. Relative paths resolve against the config file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    pub calibration: Option<PathBuf>,
    pub vectors: Option<PathBuf>,
    pub frequencies: Option<PathBuf>,
    pub segmenter: SegmenterBackend,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighwayConfig {
    pub memory: MemoryConfig,
    pub storage: StorageConfig,
    pub assets: AssetsConfig,
}

impl HighwayConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Read the file at `path`. No path or a missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file missing, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)
            .map_err(|e| StoreError::Config(format!("{}: {e}", path.display())))?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| StoreError::Config(e.to_string()))
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.storage.path);
        for asset in [
            &mut self.assets.calibration,
            &mut self.assets.vectors,
            &mut self.assets.frequencies,
        ]
        .into_iter()
        .flatten()
        {
            resolve(asset);
        }
    }
}
