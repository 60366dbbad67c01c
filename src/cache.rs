//! Content-addressed cache naming.
//!
//! A song's cache file is `<cache dir>/<keyed digest of "singer - title">.<format>`.
//! The digest is keyed with the configured secret, so names are stable for
//! one installation and not guessable from the identity alone.

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::crypto;
use crate::error::Result;

/// Maps song identities to cache paths.
#[derive(Debug, Clone)]
pub struct CacheNamer {
    dir: PathBuf,
    key: Vec<u8>,
}

impl CacheNamer {
    /// Create a namer rooted at `dir` using `secret_key`.
    pub fn new<P: AsRef<Path>>(dir: P, secret_key: &str) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            key: secret_key.as_bytes().to_vec(),
        }
    }

    /// Create a namer from the cache directory and key in `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.cache_dir, &config.secret_key)
    }

    /// The cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Keyed digest of `"<singer> - <title>"`.
    pub fn cache_key(&self, singer: &str, title: &str) -> Result<String> {
        crypto::keyed_digest(&format!("{} - {}", singer, title), &self.key)
    }

    /// `<cache key>.<format>`.
    pub fn file_name(&self, singer: &str, title: &str, format: &str) -> Result<String> {
        Ok(format!("{}.{}", self.cache_key(singer, title)?, format))
    }

    /// Full cache path for one identity and format.
    pub fn path_for(&self, singer: &str, title: &str, format: &str) -> Result<PathBuf> {
        Ok(self.dir.join(self.file_name(singer, title, format)?))
    }
}
