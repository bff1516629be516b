use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use graven_util::errors::GravenError;

use crate::repository::Repository;
use crate::scope::Scope;

/// User configuration loaded from `~/.graven/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GravenConfig {
    #[serde(default)]
    pub resolver: ResolverSettings,

    /// Named repositories, tried in name order.
    #[serde(default)]
    pub repositories: BTreeMap<String, String>,

    #[serde(default)]
    pub credentials: BTreeMap<String, CredentialEntry>,

    #[serde(default)]
    pub cache: CacheConfig,
}

/// How the conflict resolver picks one version per package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStrategy {
    /// Shallowest occurrence wins; equal depths fall back to the higher version.
    #[default]
    Nearest,
    /// Highest version wins regardless of depth.
    Highest,
}

/// What to do when a package transitively depends on itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclePolicy {
    /// Keep the repeated package as a leaf and report the cycle.
    #[default]
    Cut,
    /// Abort the resolution.
    Fail,
}

/// Resolver settings from `[resolver]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverSettings {
    /// Maximum concurrent metadata lookups.
    #[serde(default = "default_jobs")]
    pub jobs: u32,
    #[serde(default = "default_timeout_secs", rename = "timeout-secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub strategy: ConflictStrategy,
    #[serde(default)]
    pub cycles: CyclePolicy,
    /// Declared scopes dropped below the direct dependencies.
    #[serde(
        default = "default_excluded_transitive_scopes",
        rename = "excluded-transitive-scopes"
    )]
    pub excluded_transitive_scopes: Vec<Scope>,
    /// Scopes whose packages are never traversed.
    #[serde(default = "default_leaf_scopes", rename = "leaf-scopes")]
    pub leaf_scopes: Vec<Scope>,
    #[serde(default, rename = "version-filter")]
    pub version_filter: VersionFilterConfig,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            timeout_secs: default_timeout_secs(),
            strategy: ConflictStrategy::default(),
            cycles: CyclePolicy::default(),
            excluded_transitive_scopes: default_excluded_transitive_scopes(),
            leaf_scopes: default_leaf_scopes(),
            version_filter: VersionFilterConfig::default(),
        }
    }
}

impl ResolverSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_jobs() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(4)
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_excluded_transitive_scopes() -> Vec<Scope> {
    vec![Scope::Test, Scope::Provided]
}

fn default_leaf_scopes() -> Vec<Scope> {
    vec![Scope::System]
}

/// Candidate version filtering from `[resolver.version-filter]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionFilterConfig {
    /// Keep `-SNAPSHOT` candidates.
    #[serde(default = "default_true")]
    pub snapshots: bool,
    /// Only fan out the highest candidate of each range.
    #[serde(default, rename = "highest-only")]
    pub highest_only: bool,
}

impl Default for VersionFilterConfig {
    fn default() -> Self {
        Self {
            snapshots: true,
            highest_only: false,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Credential entry for a named repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialEntry {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Metadata cache configuration from `[cache]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub dir: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
        }
    }
}

fn default_cache_dir() -> String {
    "~/.graven/metadata".to_string()
}

impl GravenConfig {
    /// Load `~/.graven/config.toml`, or return defaults if the file doesn't exist.
    pub fn load() -> miette::Result<Self> {
        let path = Self::default_path();
        if path.is_file() {
            Self::from_path(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit path.
    pub fn from_path(path: &Path) -> miette::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| GravenError::Config {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;
        Self::parse_toml(&content)
    }

    pub fn parse_toml(content: &str) -> miette::Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| GravenError::Config {
            message: format!("Failed to parse config: {e}"),
        })?;
        if config.resolver.jobs == 0 {
            return Err(GravenError::Config {
                message: "resolver.jobs must be at least 1".to_string(),
            }
            .into());
        }
        Ok(config)
    }

    /// Returns the default path to the config file.
    pub fn default_path() -> PathBuf {
        dirs_path().join("config.toml")
    }

    /// Configured repositories, falling back to Maven Central when none are set.
    pub fn repositories(&self) -> Vec<Repository> {
        let mut repos: Vec<Repository> = self
            .repositories
            .iter()
            .map(|(id, url)| Repository::new(id.clone(), url.clone()))
            .collect();
        if repos.is_empty() {
            repos.push(Repository::maven_central());
        }
        repos
    }

    /// The metadata cache directory with `~` expanded.
    pub fn cache_dir(&self) -> PathBuf {
        graven_util::fs::expand_home(&self.cache.dir)
    }
}

/// Returns the path to the graven data directory (`~/.graven/`).
pub fn dirs_path() -> PathBuf {
    graven_util::fs::home_dir().join(".graven")
}
