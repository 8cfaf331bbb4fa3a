//! Service configuration.
//!
//! Deployment settings live in a TOML file; the storage and sync policy is
//! kept separately on the media itself (see
//! [`fieldnode_core::StorageConfig`]), so a card moved to another node keeps
//! its behavior.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use fieldnode_store::StoreOptions;

/// Service configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Hub endpoint.
    pub hub: HubConfig,
    /// Media settings.
    pub storage: MediaConfig,
    /// Tick and link probe timing.
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    ///
    /// # Example
    ///
    /// ```
    /// use fieldnode_service::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.hub.validate());
        errors.extend(self.storage.validate());
        errors.extend(self.scheduler.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

/// Hub endpoint configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Base URL, e.g. `http://hub.local:5000`. Without it the node only
    /// stores locally.
    pub url: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

/// Maximum request timeout in seconds.
pub const MAX_TIMEOUT_SECS: u64 = 300;

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 10,
        }
    }
}

impl HubConfig {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if let Some(url) = &self.url
            && !url.starts_with("http://")
            && !url.starts_with("https://")
        {
            errors.push(ValidationError {
                field: "hub.url".to_string(),
                message: format!("'{}' must start with http:// or https://", url),
            });
        }

        if self.timeout_secs == 0 || self.timeout_secs > MAX_TIMEOUT_SECS {
            errors.push(ValidationError {
                field: "hub.timeout_secs".to_string(),
                message: format!(
                    "timeout {} must be between 1 and {} seconds",
                    self.timeout_secs, MAX_TIMEOUT_SECS
                ),
            });
        }

        errors
    }
}

/// Media configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Mount point of the storage media.
    pub root: PathBuf,
    /// Create the root if it does not exist. Leave off for removable media
    /// so a missing card is reported instead of silently writing elsewhere.
    pub create_root: bool,
    /// Usable capacity in bytes.
    pub capacity_bytes: u64,
    /// Bytes kept free for metadata writes.
    pub reserved_bytes: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        let options = StoreOptions::default();
        Self {
            root: fieldnode_store::default_media_root(),
            create_root: true,
            capacity_bytes: options.capacity_bytes,
            reserved_bytes: options.reserved_bytes,
        }
    }
}

impl MediaConfig {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.root.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.root".to_string(),
                message: "media root cannot be empty".to_string(),
            });
        }

        if self.reserved_bytes >= self.capacity_bytes {
            errors.push(ValidationError {
                field: "storage.reserved_bytes".to_string(),
                message: format!(
                    "reserve {} must be smaller than capacity {}",
                    self.reserved_bytes, self.capacity_bytes
                ),
            });
        }

        errors
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            capacity_bytes: self.capacity_bytes,
            reserved_bytes: self.reserved_bytes,
        }
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Time between two scheduler passes, in milliseconds.
    pub tick_interval_ms: u64,
    /// Time between two link probes, in milliseconds.
    pub link_probe_interval_ms: u64,
    /// Connect timeout of one link probe, in milliseconds.
    pub link_probe_timeout_ms: u64,
}

/// Minimum tick interval in milliseconds.
pub const MIN_TICK_INTERVAL_MS: u64 = 100;
/// Maximum tick interval in milliseconds (1 minute).
pub const MAX_TICK_INTERVAL_MS: u64 = 60_000;

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            link_probe_interval_ms: 5000,
            link_probe_timeout_ms: 2000,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if !(MIN_TICK_INTERVAL_MS..=MAX_TICK_INTERVAL_MS).contains(&self.tick_interval_ms) {
            errors.push(ValidationError {
                field: "scheduler.tick_interval_ms".to_string(),
                message: format!(
                    "tick interval {} must be between {} and {} ms",
                    self.tick_interval_ms, MIN_TICK_INTERVAL_MS, MAX_TICK_INTERVAL_MS
                ),
            });
        }

        if self.link_probe_interval_ms < MIN_TICK_INTERVAL_MS {
            errors.push(ValidationError {
                field: "scheduler.link_probe_interval_ms".to_string(),
                message: format!(
                    "probe interval {} is too short (minimum {} ms)",
                    self.link_probe_interval_ms, MIN_TICK_INTERVAL_MS
                ),
            });
        }

        if self.link_probe_timeout_ms == 0
            || self.link_probe_timeout_ms > self.link_probe_interval_ms
        {
            errors.push(ValidationError {
                field: "scheduler.link_probe_timeout_ms".to_string(),
                message: format!(
                    "probe timeout {} must be between 1 and the probe interval ({} ms)",
                    self.link_probe_timeout_ms, self.link_probe_interval_ms
                ),
            });
        }

        errors
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
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
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
    /// The field path (e.g., `hub.url` or `scheduler.tick_interval_ms`).
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

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fieldnode")
        .join("node.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.hub.url, None);
        assert_eq!(config.hub.timeout_secs, 10);
        assert_eq!(config.scheduler.tick_interval_ms, 1000);
        assert_eq!(config.storage.root, fieldnode_store::default_media_root());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_full_toml() {
        let toml = r#"
            [hub]
            url = "http://hub.local:5000"
            timeout_secs = 5

            [storage]
            root = "/media/sd"
            create_root = false
            capacity_bytes = 33554432

            [scheduler]
            tick_interval_ms = 500
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.hub.url.as_deref(), Some("http://hub.local:5000"));
        assert_eq!(config.hub.timeout_secs, 5);
        assert_eq!(config.storage.root, PathBuf::from("/media/sd"));
        assert!(!config.storage.create_root);
        assert_eq!(config.storage.store_options().capacity_bytes, 33_554_432);
        assert_eq!(config.storage.reserved_bytes, 64 * 1024);
        assert_eq!(config.scheduler.tick_interval_ms, 500);
        assert_eq!(config.scheduler.link_probe_interval_ms, 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("node.toml");

        let config = Config {
            hub: HubConfig {
                url: Some("https://hub.example.org".to_string()),
                timeout_secs: 30,
            },
            ..Default::default()
        };

        config.save(&config_path).unwrap();
        let loaded = Config::load(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_load_errors() {
        let result = Config::load("/nonexistent/path/node.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));

        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("invalid.toml");
        std::fs::write(&config_path, "this is not valid { toml").unwrap();
        let result = Config::load(&config_path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.ends_with("fieldnode/node.toml"));
    }

    #[test]
    fn test_hub_validation() {
        let hub = HubConfig {
            url: Some("hub.local:5000".to_string()),
            timeout_secs: 0,
        };
        let fields: Vec<String> = hub.validate().into_iter().map(|e| e.field).collect();
        assert_eq!(fields, ["hub.url", "hub.timeout_secs"]);
    }

    #[test]
    fn test_media_validation() {
        let media = MediaConfig {
            root: PathBuf::new(),
            capacity_bytes: 1024,
            reserved_bytes: 1024,
            ..Default::default()
        };
        assert_eq!(media.validate().len(), 2);
    }

    #[test]
    fn test_scheduler_validation() {
        let scheduler = SchedulerConfig {
            tick_interval_ms: 10,
            link_probe_interval_ms: 1000,
            link_probe_timeout_ms: 5000,
        };
        let errors = scheduler.validate();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "scheduler.tick_interval_ms");
        assert_eq!(errors[1].field, "scheduler.link_probe_timeout_ms");
    }

    #[test]
    fn test_config_validation_error_display() {
        let config = Config {
            scheduler: SchedulerConfig {
                tick_interval_ms: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        let display = err.to_string();
        assert!(display.contains("Configuration validation failed"));
        assert!(display.contains("scheduler.tick_interval_ms"));
    }
}
