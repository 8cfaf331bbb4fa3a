//! Storage and sync configuration.
//!
//! The configuration lives on the node's media as `config.json`, using the
//! camel-case keys the rest of the fleet tooling reads:
//!
//! ```json
//! {
//!   "mode": "LOCAL_AUTOSYNC",
//!   "syncStrategy": "IMMEDIATE",
//!   "batchSize": 50,
//!   "syncIntervalMs": 60000,
//!   "maxRetries": 5,
//!   "initialRetryDelayMs": 60000,
//!   "maxRetryDelayMs": 900000,
//!   "autoCleanup": true,
//!   "keepSyncedDays": 7,
//!   "minFreeBytes": 1048576,
//!   "enableStatusLed": true,
//!   "enableSyncButton": true,
//!   "interRecordDelayMs": 50
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use fieldnode_types::{StorageMode, SyncStrategy};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::policy::StoragePolicy;
use crate::retry::RetryConfig;

/// File name of the persisted configuration, relative to the media root.
pub const CONFIG_FILE: &str = "config.json";

/// Largest batch the engine will pull in one normal pass.
pub const MAX_BATCH_SIZE: usize = 1000;

/// Process-wide storage and sync settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StorageConfig {
    pub mode: StorageMode,
    pub sync_strategy: SyncStrategy,
    /// Readings per sync batch.
    pub batch_size: usize,
    /// Interval for [`SyncStrategy::Scheduled`].
    pub sync_interval_ms: u64,
    /// Failed attempts before the engine enters the error state.
    pub max_retries: u32,
    pub initial_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    /// Delete old synced partitions automatically.
    pub auto_cleanup: bool,
    /// Retention window for synced partitions, in days.
    pub keep_synced_days: u32,
    /// Free space below which synced partitions are reclaimed.
    pub min_free_bytes: u64,
    pub enable_status_led: bool,
    pub enable_sync_button: bool,
    /// Pause between two submissions of a batch.
    pub inter_record_delay_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mode: StorageMode::LocalAutosync,
            sync_strategy: SyncStrategy::Immediate,
            batch_size: 50,
            sync_interval_ms: 60_000,
            max_retries: 5,
            initial_retry_delay_ms: 60_000,
            max_retry_delay_ms: 900_000,
            auto_cleanup: true,
            keep_synced_days: 7,
            min_free_bytes: 1024 * 1024,
            enable_status_led: true,
            enable_sync_button: true,
            inter_record_delay_ms: 50,
        }
    }
}

impl StorageConfig {
    /// Load configuration from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a JSON file, replacing it atomically.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        let write_err = |e| ConfigError::Write {
            path: path.to_path_buf(),
            source: e,
        };

        let temp = path.with_extension("json.tmp");
        fs::write(&temp, content).map_err(write_err)?;
        fs::rename(&temp, path).map_err(write_err)
    }

    /// Validate the configuration and return any errors.
    ///
    /// ```
    /// use fieldnode_core::StorageConfig;
    ///
    /// StorageConfig::default().validate().expect("defaults are valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        let mut check = |ok: bool, field: &str, message: String| {
            if !ok {
                errors.push(ValidationError {
                    field: field.to_string(),
                    message,
                });
            }
        };

        check(
            (1..=MAX_BATCH_SIZE).contains(&self.batch_size),
            "batchSize",
            format!("must be between 1 and {MAX_BATCH_SIZE}, got {}", self.batch_size),
        );
        check(
            self.initial_retry_delay_ms > 0,
            "initialRetryDelayMs",
            "must be greater than 0".to_string(),
        );
        check(
            self.max_retry_delay_ms >= self.initial_retry_delay_ms,
            "maxRetryDelayMs",
            format!(
                "must be at least initialRetryDelayMs ({}), got {}",
                self.initial_retry_delay_ms, self.max_retry_delay_ms
            ),
        );
        check(
            self.sync_strategy != SyncStrategy::Scheduled || self.sync_interval_ms >= 1000,
            "syncIntervalMs",
            format!(
                "must be at least 1000 for SCHEDULED sync, got {}",
                self.sync_interval_ms
            ),
        );
        check(
            self.inter_record_delay_ms <= 10_000,
            "interRecordDelayMs",
            format!("must be at most 10000, got {}", self.inter_record_delay_ms),
        );

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Routing policy for the configured mode.
    pub fn policy(&self) -> StoragePolicy {
        StoragePolicy::new(self.mode)
    }

    /// Backoff settings for the sync engine.
    pub fn retry(&self) -> RetryConfig {
        RetryConfig::from_millis(
            self.max_retries,
            self.initial_retry_delay_ms,
            self.max_retry_delay_ms,
        )
    }
}

/// Owns the active [`StorageConfig`] and its file on the media.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    path: PathBuf,
    config: StorageConfig,
}

impl ConfigManager {
    /// Load the configuration from `path`.
    ///
    /// A missing file yields the defaults, which are written back. An
    /// unreadable or invalid file is logged and replaced by defaults in
    /// memory only, leaving the file for inspection.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            info!("No configuration at {}, writing defaults", path.display());
            let manager = Self {
                path,
                config: StorageConfig::default(),
            };
            manager.save()?;
            return Ok(manager);
        }

        let config = match StorageConfig::load(&path).and_then(|c| c.validate().map(|()| c)) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring configuration {}: {}", path.display(), e);
                StorageConfig::default()
            }
        };
        Ok(Self { path, config })
    }

    /// Configuration file inside a media root.
    pub fn in_media_root<P: AsRef<Path>>(root: P) -> Result<Self, ConfigError> {
        Self::load(root.as_ref().join(CONFIG_FILE))
    }

    /// Manager that never touched disk, for tests and previews.
    pub fn with_config<P: Into<PathBuf>>(path: P, config: StorageConfig) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist the active configuration.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.config.save(&self.path)
    }

    /// Replace the configuration after validating it; persists on change.
    pub fn update(&mut self, config: StorageConfig) -> Result<bool, ConfigError> {
        config.validate()?;
        if config == self.config {
            return Ok(false);
        }
        self.config = config;
        self.save()?;
        info!(
            "Configuration updated: mode={}, strategy={}",
            self.config.mode, self.config.sync_strategy
        );
        Ok(true)
    }

    /// Switch the storage mode; persists on change.
    pub fn set_mode(&mut self, mode: StorageMode) -> Result<bool, ConfigError> {
        let config = StorageConfig {
            mode,
            ..self.config.clone()
        };
        self.update(config)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(serde_json::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field name as it appears in `config.json`.
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}
