//! Configuration module for notesync.
//!
//! Typed configuration structs mapped to the YAML configuration file, with
//! loading, validation, defaults, and a builder for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::ConflictResolution;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for notesync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub retry: RetryConfig,
    pub conflicts: ConflictsConfig,
    pub cache: CacheConfig,
    pub remote: RemoteConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

/// Signal used to decide that one side of a pairing changed since the last
/// synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeDetection {
    /// Content digest differs from the stored one. The modification time is
    /// only consulted when no digest was stored.
    Checksum,
    /// Modification time after the checkpoint, or digest differs.
    TimestampOrChecksum,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Operations allowed in flight at once.
    pub max_concurrent_operations: usize,
    pub change_detection: ChangeDetection,
    /// Seconds between runs in watch mode.
    pub poll_interval: u64,
}

/// Retry policy for transient failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per operation, including the first.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

/// A glob rule overriding the default conflict policy for matching paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRuleConfig {
    pub pattern: String,
    pub resolution: ConflictResolution,
}

/// Conflict resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictsConfig {
    /// Applied when the decision callback gives no answer.
    pub default_policy: ConflictResolution,
    /// Seconds to wait for the decision callback.
    pub decision_timeout_secs: u64,
    /// Evaluated in order, first match wins.
    pub rules: Vec<ConflictRuleConfig>,
}

/// Remote content cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub sweep_interval_secs: u64,
    /// TTL for individual item content.
    pub item_ttl_secs: u64,
    /// TTL for workspace-level listings.
    pub listing_ttl_secs: u64,
    /// TTL for page metadata (edit times).
    pub metadata_ttl_secs: u64,
    /// Where the cache is persisted between runs. `None` disables it.
    pub snapshot_path: Option<PathBuf>,
}

/// Remote store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    /// Value of the `Notion-Version` header.
    pub api_version: String,
    /// Environment variable holding the integration token.
    pub token_env: String,
    pub requests_per_second: f64,
    pub burst: u32,
    pub request_timeout_secs: u64,
}

/// Metadata database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    pub format: LogFormat,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/notesync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("notesync")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrent_operations: 3,
            change_detection: ChangeDetection::Checksum,
            poll_interval: 300,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 16_000,
        }
    }
}

impl Default for ConflictsConfig {
    fn default() -> Self {
        Self {
            default_policy: ConflictResolution::Skip,
            decision_timeout_secs: 30,
            rules: Vec::new(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1_000,
            sweep_interval_secs: 60,
            item_ttl_secs: 60 * 60,
            listing_ttl_secs: 30 * 60,
            metadata_ttl_secs: 60,
            snapshot_path: None,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.notion.com/v1".into(),
            api_version: "2022-06-28".into(),
            token_env: "NOTESYNC_TOKEN".into(),
            requests_per_second: 3.0,
            burst: 3,
            request_timeout_secs: 30,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("notesync")
                .join("notesync.db"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Pretty,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.poll_interval"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

fn positive(errors: &mut Vec<ValidationError>, field: &str, value: u64) {
    if value == 0 {
        errors.push(ValidationError {
            field: field.into(),
            message: "must be greater than 0".into(),
        });
    }
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        positive(
            &mut errors,
            "sync.max_concurrent_operations",
            self.sync.max_concurrent_operations as u64,
        );
        positive(&mut errors, "sync.poll_interval", self.sync.poll_interval);

        // --- retry ---
        positive(&mut errors, "retry.max_attempts", u64::from(self.retry.max_attempts));
        positive(&mut errors, "retry.base_delay_ms", self.retry.base_delay_ms);
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            errors.push(ValidationError {
                field: "retry.max_delay_ms".into(),
                message: format!(
                    "({}) must not be smaller than retry.base_delay_ms ({})",
                    self.retry.max_delay_ms, self.retry.base_delay_ms
                ),
            });
        }

        // --- conflicts ---
        if self.conflicts.default_policy == ConflictResolution::AskUser {
            errors.push(ValidationError {
                field: "conflicts.default_policy".into(),
                message: "must be a concrete policy, not ask_user".into(),
            });
        }
        for (i, rule) in self.conflicts.rules.iter().enumerate() {
            if rule.pattern.trim().is_empty() {
                errors.push(ValidationError {
                    field: format!("conflicts.rules[{i}].pattern"),
                    message: "must not be empty".into(),
                });
            }
            if rule.resolution == ConflictResolution::AskUser {
                errors.push(ValidationError {
                    field: format!("conflicts.rules[{i}].resolution"),
                    message: "must be a concrete policy, not ask_user".into(),
                });
            }
        }

        // --- cache ---
        positive(&mut errors, "cache.max_entries", self.cache.max_entries as u64);
        positive(&mut errors, "cache.sweep_interval_secs", self.cache.sweep_interval_secs);
        positive(&mut errors, "cache.item_ttl_secs", self.cache.item_ttl_secs);
        positive(&mut errors, "cache.listing_ttl_secs", self.cache.listing_ttl_secs);
        positive(&mut errors, "cache.metadata_ttl_secs", self.cache.metadata_ttl_secs);

        // --- remote ---
        if !(self.remote.base_url.starts_with("http://")
            || self.remote.base_url.starts_with("https://"))
        {
            errors.push(ValidationError {
                field: "remote.base_url".into(),
                message: format!("not an http(s) URL: {}", self.remote.base_url),
            });
        }
        if !(self.remote.requests_per_second > 0.0) {
            errors.push(ValidationError {
                field: "remote.requests_per_second".into(),
                message: "must be greater than 0".into(),
            });
        }
        positive(&mut errors, "remote.burst", u64::from(self.remote.burst));
        positive(
            &mut errors,
            "remote.request_timeout_secs",
            self.remote.request_timeout_secs,
        );
        if self.remote.token_env.trim().is_empty() {
            errors.push(ValidationError {
                field: "remote.token_env".into(),
                message: "must name an environment variable".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}', expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for [`Config`], starting from the defaults.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder pre-filled with [`Config::default`].
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn max_concurrent_operations(mut self, n: usize) -> Self {
        self.config.sync.max_concurrent_operations = n;
        self
    }

    pub fn change_detection(mut self, mode: ChangeDetection) -> Self {
        self.config.sync.change_detection = mode;
        self
    }

    pub fn poll_interval(mut self, seconds: u64) -> Self {
        self.config.sync.poll_interval = seconds;
        self
    }

    pub fn retry_max_attempts(mut self, n: u32) -> Self {
        self.config.retry.max_attempts = n;
        self
    }

    pub fn retry_delays_ms(mut self, base: u64, max: u64) -> Self {
        self.config.retry.base_delay_ms = base;
        self.config.retry.max_delay_ms = max;
        self
    }

    pub fn default_policy(mut self, policy: ConflictResolution) -> Self {
        self.config.conflicts.default_policy = policy;
        self
    }

    pub fn decision_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.conflicts.decision_timeout_secs = seconds;
        self
    }

    pub fn conflict_rule(mut self, pattern: impl Into<String>, resolution: ConflictResolution) -> Self {
        self.config.conflicts.rules.push(ConflictRuleConfig {
            pattern: pattern.into(),
            resolution,
        });
        self
    }

    pub fn cache_max_entries(mut self, n: usize) -> Self {
        self.config.cache.max_entries = n;
        self
    }

    pub fn cache_snapshot_path(mut self, path: PathBuf) -> Self {
        self.config.cache.snapshot_path = Some(path);
        self
    }

    pub fn remote_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.base_url = url.into();
        self
    }

    pub fn database_path(mut self, path: PathBuf) -> Self {
        self.config.database.path = path;
        self
    }

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
