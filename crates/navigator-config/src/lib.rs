//! # navigator-config: multi-source configuration loading
//!
//! Loads [`NavigatorConfig`] from, in increasing precedence order: built-in
//! defaults, a user config file (`~/.config/navigator/config.toml`), a
//! project file (`navigator.toml`), a local override (`navigator.local.toml`,
//! gitignored), then `NAVIGATOR_*` environment variables.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use navigator_types::RetryPolicy;
use serde::{Deserialize, Serialize};

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// The recognized runtime configuration keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigatorConfig {
    pub data_root: PathBuf,
    pub shard_count: usize,
    pub cache_memory_threshold_bytes: usize,
    pub entry_ttl_seconds: u64,
    pub cleanup_interval_ms: u64,
    pub effect_worker_pool: usize,
    pub subscriber_deadline_ms: u64,
    pub retry_default: RetryPolicy,
    /// Maps a provider name to the capability port that serves it.
    pub llm_providers: HashMap<String, String>,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("./data"),
            shard_count: 10,
            cache_memory_threshold_bytes: 268_435_456,
            entry_ttl_seconds: 3600,
            cleanup_interval_ms: 30_000,
            effect_worker_pool: 64,
            subscriber_deadline_ms: 1000,
            retry_default: RetryPolicy::default(),
            llm_providers: HashMap::new(),
        }
    }
}

impl NavigatorConfig {
    /// Loads configuration from the default locations, rooted at the
    /// current directory.
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Loads configuration rooted at `project_dir`.
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Resolves `data_root` to an absolute path under `base_dir` if relative.
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        if self.data_root.is_relative() {
            self.data_root = base_dir.as_ref().join(&self.data_root);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_values() {
        let config = NavigatorConfig::default();
        assert_eq!(config.data_root, PathBuf::from("./data"));
        assert_eq!(config.shard_count, 10);
        assert_eq!(config.cache_memory_threshold_bytes, 268_435_456);
        assert_eq!(config.entry_ttl_seconds, 3600);
        assert_eq!(config.cleanup_interval_ms, 30_000);
        assert_eq!(config.effect_worker_pool, 64);
        assert_eq!(config.subscriber_deadline_ms, 1000);
        assert_eq!(config.retry_default, RetryPolicy::default());
        assert!(config.llm_providers.is_empty());
    }

    #[test]
    fn resolve_paths_makes_data_root_absolute() {
        let mut config = NavigatorConfig::default();
        config.resolve_paths("/srv/navigator");
        assert_eq!(config.data_root, PathBuf::from("/srv/navigator/data"));
    }
}
