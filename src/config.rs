//! Run configuration.
//!
//! Values come from an optional TOML file, then command-line flags override
//! them. Every field has a default so a missing file means defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::error::SyncResult;
use crate::storage::VerifyPolicy;
use crate::sync::copy::{default_concurrency, CopyOptions};
use crate::sync::exclude::ExcludePatterns;
use crate::sync::lister::DEFAULT_PAGE_SIZE;
use crate::sync::location::DEFAULT_FALLBACK_REGION;
use crate::sync::throttle::RequestLimiter;

/// Config file name inside the per-user config directory.
pub const CONFIG_FILE: &str = "bucketsync/config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Region used when bucket region discovery fails.
    pub fallback_region: String,
    /// Custom S3-compatible endpoint.
    pub endpoint: Option<String>,
    /// Shared-config profile; `None` uses the default credential chain.
    pub profile: Option<String>,
    /// Copy tasks in flight at once. 0 picks a size from the CPU count.
    pub max_concurrency: usize,
    pub task_timeout_secs: u64,
    /// Deadline for the whole copy phase.
    pub run_deadline_secs: Option<u64>,
    pub verify_interval_ms: u64,
    pub verify_max_attempts: u32,
    pub list_page_size: i32,
    /// Storage requests per second during the copy phase. 0 = unlimited.
    pub max_requests_per_second: u32,
    /// Glob patterns over source keys relative to the source prefix.
    pub exclude: Vec<String>,
    pub dry_run: bool,
    /// Exit non-zero when any object fails to copy.
    pub fail_on_copy_error: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            fallback_region: DEFAULT_FALLBACK_REGION.to_string(),
            endpoint: None,
            profile: None,
            max_concurrency: 0,
            task_timeout_secs: 300,
            run_deadline_secs: None,
            verify_interval_ms: 5000,
            verify_max_attempts: 20,
            list_page_size: DEFAULT_PAGE_SIZE,
            max_requests_per_second: 0,
            exclude: Vec::new(),
            dry_run: false,
            fail_on_copy_error: false,
        }
    }
}

impl SyncConfig {
    /// `<config dir>/bucketsync/config.toml`, if a config dir exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_FILE))
    }

    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Load `path` when given, else the default file when it exists, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::load(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fallback_region.trim().is_empty() {
            return Err(ConfigError::Invalid("fallback_region must not be empty".into()));
        }
        if self.task_timeout_secs == 0 {
            return Err(ConfigError::Invalid("task_timeout_secs must be positive".into()));
        }
        if self.run_deadline_secs == Some(0) {
            return Err(ConfigError::Invalid("run_deadline_secs must be positive".into()));
        }
        if self.verify_max_attempts == 0 {
            return Err(ConfigError::Invalid("verify_max_attempts must be positive".into()));
        }
        if !(1..=DEFAULT_PAGE_SIZE).contains(&self.list_page_size) {
            return Err(ConfigError::Invalid(format!(
                "list_page_size must be between 1 and {}",
                DEFAULT_PAGE_SIZE
            )));
        }
        Ok(())
    }

    pub fn concurrency(&self) -> usize {
        if self.max_concurrency == 0 {
            default_concurrency()
        } else {
            self.max_concurrency
        }
    }

    pub fn verify_policy(&self) -> VerifyPolicy {
        VerifyPolicy::new(
            Duration::from_millis(self.verify_interval_ms),
            self.verify_max_attempts,
        )
    }

    pub fn copy_options(&self) -> CopyOptions {
        CopyOptions {
            max_concurrency: self.concurrency(),
            task_timeout: Duration::from_secs(self.task_timeout_secs),
            run_deadline: self.run_deadline_secs.map(Duration::from_secs),
            verify: self.verify_policy(),
            limiter: RequestLimiter::new(self.max_requests_per_second),
        }
    }

    pub fn exclude_patterns(&self) -> SyncResult<ExcludePatterns> {
        ExcludePatterns::from_patterns(&self.exclude)
    }
}
