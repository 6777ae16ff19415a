use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use repocache_util::errors::{RepoCacheError, RepoCacheResult};
use repocache_util::fs::expand_tilde;

/// Global configuration loaded from `~/.repocache/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub git: GitConfig,

    #[serde(default)]
    pub hints: HintsConfig,

    #[serde(default)]
    pub snapshots: SnapshotConfig,
}

/// Working-tree cache settings from `[cache]`.
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

impl CacheConfig {
    pub fn dir_path(&self) -> PathBuf {
        expand_tilde(&self.dir)
    }
}

fn default_cache_dir() -> String {
    "~/.repocache/repos".to_string()
}

/// Git executable settings from `[git]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    #[serde(default = "default_git_program")]
    pub program: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            program: default_git_program(),
        }
    }
}

fn default_git_program() -> String {
    "git".to_string()
}

/// Which hint store implementation backs the session cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HintBackend {
    #[default]
    File,
    Http,
    Memory,
}

/// Hint store settings from `[hints]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HintsConfig {
    #[serde(default)]
    pub backend: HintBackend,
    #[serde(default = "default_hints_file")]
    pub file: String,
    #[serde(default)]
    pub url: Option<String>,
    /// Default for whether build sessions persist their hints on close.
    #[serde(default = "default_true")]
    pub save: bool,
}

impl Default for HintsConfig {
    fn default() -> Self {
        Self {
            backend: HintBackend::default(),
            file: default_hints_file(),
            url: None,
            save: true,
        }
    }
}

impl HintsConfig {
    pub fn file_path(&self) -> PathBuf {
        expand_tilde(&self.file)
    }
}

fn default_hints_file() -> String {
    "~/.repocache/hints.json".to_string()
}

/// Repository snapshot (blob store) settings from `[snapshots]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_snapshot_dir")]
    pub dir: String,
    #[serde(default = "default_max_repo_size", rename = "max-repo-size")]
    pub max_repo_size: String,
    #[serde(default = "default_max_size", rename = "max-size")]
    pub max_size: String,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_snapshot_dir(),
            max_repo_size: default_max_repo_size(),
            max_size: default_max_size(),
        }
    }
}

impl SnapshotConfig {
    pub fn dir_path(&self) -> PathBuf {
        expand_tilde(&self.dir)
    }

    /// Largest repository (in bytes) that gets snapshotted.
    pub fn max_repo_bytes(&self) -> RepoCacheResult<u64> {
        parse_size(&self.max_repo_size)
    }

    /// Total snapshot store budget in bytes.
    pub fn max_total_bytes(&self) -> RepoCacheResult<u64> {
        parse_size(&self.max_size)
    }
}

fn default_snapshot_dir() -> String {
    "~/.repocache/snapshots".to_string()
}

fn default_max_repo_size() -> String {
    "10MB".to_string()
}

fn default_max_size() -> String {
    "1GB".to_string()
}

fn default_true() -> bool {
    true
}

impl GlobalConfig {
    /// Load configuration from `path`, or from the default location when `None`.
    ///
    /// A missing file yields defaults; a file that exists but cannot be read
    /// or parsed is an error.
    pub fn load(path: Option<&Path>) -> RepoCacheResult<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
        if !path.is_file() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).map_err(|e| RepoCacheError::Config {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;
        Self::parse(&content).map_err(|e| match e {
            RepoCacheError::Config { message } => RepoCacheError::Config {
                message: format!("{}: {message}", path.display()),
            },
            other => other,
        })
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> RepoCacheResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| RepoCacheError::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> RepoCacheResult<()> {
        if self.hints.backend == HintBackend::Http && self.hints.url.is_none() {
            return Err(RepoCacheError::Config {
                message: "hints.backend = \"http\" requires hints.url".to_string(),
            });
        }
        self.snapshots.max_repo_bytes()?;
        self.snapshots.max_total_bytes()?;
        Ok(())
    }

    /// Returns the default path to the global config file.
    pub fn default_path() -> PathBuf {
        repocache_util::dirs_path().join("config.toml")
    }
}

/// Parse a human size such as `10MB`, `1GB`, `512KB` or `2048` (bytes).
pub fn parse_size(s: &str) -> RepoCacheResult<u64> {
    let s = s.trim();
    let upper = s.to_ascii_uppercase();
    let (num, unit) = if let Some(n) = upper.strip_suffix("GB") {
        (n, 1024u64 * 1024 * 1024)
    } else if let Some(n) = upper.strip_suffix("MB") {
        (n, 1024u64 * 1024)
    } else if let Some(n) = upper.strip_suffix("KB") {
        (n, 1024u64)
    } else if let Some(n) = upper.strip_suffix('B') {
        (n, 1u64)
    } else {
        (upper.as_str(), 1u64)
    };
    num.trim()
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(unit))
        .ok_or_else(|| RepoCacheError::Config {
            message: format!("Invalid size `{s}`"),
        })
}
