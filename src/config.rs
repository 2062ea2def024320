// Dashboard configuration.
// Loads the repository list and cache settings from a YAML file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cache::{CacheConfig, DEFAULT_TTL};
use crate::error::Result;

pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_BATCH_SIZE: usize = 3;
pub const DEFAULT_RECENT_COMMITS: u32 = 5;

/// Path to the default config file (~/.config/repodash/config.yml on Linux).
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "repodash").map(|dirs| dirs.config_dir().join("config.yml"))
}

/// A repository shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
    /// Branch whose recent commits are shown.
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Overrides the repository's own description.
    #[serde(default)]
    pub description: Option<String>,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            branch: default_branch(),
            description: None,
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    /// Parse `owner/name`.
    pub fn parse(full_name: &str) -> Option<Self> {
        let (owner, name) = full_name.split_once('/')?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self::new(owner, name))
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_recent_commits() -> u32 {
    DEFAULT_RECENT_COMMITS
}

fn default_ttl_minutes() -> u64 {
    DEFAULT_TTL.as_secs() / 60
}

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub repositories: Vec<RepoRef>,
    #[serde(default = "default_ttl_minutes")]
    pub cache_ttl_minutes: u64,
    /// Repositories loaded concurrently per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Commits shown on each summary card.
    #[serde(default = "default_recent_commits")]
    pub recent_commits: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repositories: vec![
                RepoRef::new("rust-lang", "rust").with_branch("master"),
                RepoRef::new("tokio-rs", "tokio").with_branch("master"),
                RepoRef::new("serde-rs", "serde").with_branch("master"),
            ],
            cache_ttl_minutes: default_ttl_minutes(),
            batch_size: DEFAULT_BATCH_SIZE,
            recent_commits: DEFAULT_RECENT_COMMITS,
        }
    }
}

impl Config {
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Read a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Read a config file, falling back to the built-in repository list when it
    /// is missing or invalid.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            warn!("no config directory available, using built-in repository list");
            return Self::default();
        };

        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using built-in repository list");
                Self::default()
            }
        }
    }

    /// TTL in minutes as a duration, saturating on overflow.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_minutes.saturating_mul(60))
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            ttl: self.cache_ttl(),
        }
    }
}
