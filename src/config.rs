//! Settings loaded from a TOML file.
//!
//! Supplies the cache directory and the secret key used for cache naming,
//! plus transport and paging knobs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MusicNetError, Result};

/// Default User-Agent for provider requests.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory downloaded media is cached in.
    pub cache_dir: PathBuf,

    /// Key for the cache-name digest. Changing it renames every cache entry.
    pub secret_key: String,

    /// Application-identifying header sent with every request.
    pub user_agent: String,

    /// Upper bound for one download; 0 waits forever.
    pub download_timeout_secs: u64,

    pub kw: ProviderConfig,
    pub wy: ProviderConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Overrides the query's built-in page size.
    pub page_size: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("cache"),
            secret_key: "musicnet".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            download_timeout_secs: 120,
            kw: ProviderConfig::default(),
            wy: ProviderConfig::default(),
        }
    }
}

impl Config {
    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| MusicNetError::Config(e.to_string()))
    }

    /// Download time limit, or `None` when disabled.
    pub fn download_timeout(&self) -> Option<Duration> {
        match self.download_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}
