//! Project configuration loaded from `blockgraph.toml`

use blockgraph_core::CACHE_DIR;
use blockgraph_transformers::TransformersConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE: &str = "blockgraph.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Every field is optional; a missing file means all defaults.
///
/// ```toml
/// cache_dir = ".blockgraph"
///
/// [transformers]
/// order = ["hidden_content", "library_content", "sequence_icons"]
///
/// [transformers.library_content]
/// default_max_count = 1
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockGraphConfig {
    /// Structure cache directory. Relative paths are resolved against the
    /// project root.
    pub cache_dir: PathBuf,
    pub transformers: TransformersConfig,
}

impl Default for BlockGraphConfig {
    fn default() -> Self {
        BlockGraphConfig {
            cache_dir: PathBuf::from(CACHE_DIR),
            transformers: TransformersConfig::default(),
        }
    }
}

impl BlockGraphConfig {
    /// Load `blockgraph.toml` from `root`, or defaults if there is none.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            tracing::debug!("No {} in {}, using defaults", CONFIG_FILE, root.display());
            return Ok(Self::default());
        }
        Self::from_file(&path)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&contents)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn resolved_cache_dir(&self, root: &Path) -> PathBuf {
        if self.cache_dir.is_absolute() {
            self.cache_dir.clone()
        } else {
            root.join(&self.cache_dir)
        }
    }
}
