//! Configuration module for dirmirror.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.
//! The engine never holds a [`Config`] directly: it asks a [`ConfigSource`] for
//! an immutable [`ConfigSnapshot`] at cycle boundaries.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::domain::RemoteTarget;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for dirmirror.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub remote: RemoteConfig,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

/// Remote storage service settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// OAuth token sent as `Authorization: OAuth <token>`.
    pub token: String,
    /// Base URL of the disk REST API, without trailing slash.
    pub base_url: String,
    /// Overall request timeout in seconds (uploads included).
    pub timeout_secs: u64,
    /// TCP/TLS connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Skip the remote trash when deleting.
    pub permanent_delete: bool,
    /// Delay between commit retries while the service answers 202.
    pub processing_retry_delay_ms: u64,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Local directory mirrored to the remote folder of the same name.
    pub local_dir: PathBuf,
    /// Manifest file recording what has been mirrored.
    pub manifest_path: PathBuf,
    /// Seconds between reconciliation cycles.
    pub poll_interval: f64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Path to the log file.
    pub file: PathBuf,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("token", &if self.token.is_empty() { "" } else { "<redacted>" })
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("permanent_delete", &self.permanent_delete)
            .field("processing_retry_delay_ms", &self.processing_retry_delay_ms)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/dirmirror/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("dirmirror")
            .join("config.yaml")
    }

    /// Immutable view of the settings the engine works from.
    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            credential: self.remote.token.clone(),
            local_dir: expand_tilde(&self.sync.local_dir),
            manifest_path: expand_tilde(&self.sync.manifest_path),
            poll_interval: self.sync.poll_interval,
        }
    }
}

/// Expands a leading `~` to the home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

/// Default base URL of the disk REST API.
pub const DEFAULT_BASE_URL: &str = "https://cloud-api.yandex.net/v1/disk";

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 300,
            connect_timeout_secs: 30,
            permanent_delete: false,
            processing_retry_delay_ms: 500,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("dirmirror");
        Self {
            local_dir: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("~"))
                .join("Mirror"),
            manifest_path: data_dir.join("manifest.json"),
            poll_interval: 30.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("dirmirror");
        Self {
            level: "info".to_string(),
            file: data_dir.join("dirmirror.log"),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
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

/// Accepted range for `sync.poll_interval`, in seconds.
pub const POLL_INTERVAL_RANGE: std::ops::RangeInclusive<f64> = 0.1..=86400.0;

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid. A missing
    /// `sync.local_dir` is not an error: the engine waits for it to appear.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- remote ---
        if !self.remote.base_url.starts_with("https://")
            && !self.remote.base_url.starts_with("http://")
        {
            errors.push(ValidationError {
                field: "remote.base_url".into(),
                message: format!("must be an http(s) URL, got '{}'", self.remote.base_url),
            });
        }
        if self.remote.timeout_secs == 0 {
            errors.push(ValidationError {
                field: "remote.timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.remote.connect_timeout_secs == 0 {
            errors.push(ValidationError {
                field: "remote.connect_timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- sync ---
        if !POLL_INTERVAL_RANGE.contains(&self.sync.poll_interval) {
            errors.push(ValidationError {
                field: "sync.poll_interval".into(),
                message: format!(
                    "must be in range {}..={} seconds",
                    POLL_INTERVAL_RANGE.start(),
                    POLL_INTERVAL_RANGE.end()
                ),
            });
        }
        if self.sync.manifest_path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "sync.manifest_path".into(),
                message: "must not be empty".into(),
            });
        } else if self.sync.manifest_path.file_name().is_none() {
            errors.push(ValidationError {
                field: "sync.manifest_path".into(),
                message: "must name a file".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
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

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use dirmirror_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .sync_local_dir(PathBuf::from("/home/user/Photos"))
///     .sync_poll_interval(60.0)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- remote ---

    pub fn remote_token(mut self, token: impl Into<String>) -> Self {
        self.config.remote.token = token.into();
        self
    }

    pub fn remote_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.base_url = url.into();
        self
    }

    pub fn remote_timeout_secs(mut self, secs: u64) -> Self {
        self.config.remote.timeout_secs = secs;
        self
    }

    pub fn remote_connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.remote.connect_timeout_secs = secs;
        self
    }

    pub fn remote_permanent_delete(mut self, permanent: bool) -> Self {
        self.config.remote.permanent_delete = permanent;
        self
    }

    pub fn remote_processing_retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.remote.processing_retry_delay_ms = ms;
        self
    }

    // --- sync ---

    pub fn sync_local_dir(mut self, dir: PathBuf) -> Self {
        self.config.sync.local_dir = dir;
        self
    }

    pub fn sync_manifest_path(mut self, path: PathBuf) -> Self {
        self.config.sync.manifest_path = path;
        self
    }

    pub fn sync_poll_interval(mut self, seconds: f64) -> Self {
        self.config.sync.poll_interval = seconds;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_file(mut self, file: PathBuf) -> Self {
        self.config.logging.file = file;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
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

// ---------------------------------------------------------------------------
// ConfigSnapshot and ConfigSource
// ---------------------------------------------------------------------------

/// Which runtime-relevant settings differ between two snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotChanges {
    pub credential: bool,
    pub poll_interval: bool,
    pub local_dir: bool,
}

impl SnapshotChanges {
    pub fn any(&self) -> bool {
        self.credential || self.poll_interval || self.local_dir
    }
}

/// Immutable view of the settings the engine needs, taken at one instant.
#[derive(Clone, PartialEq)]
pub struct ConfigSnapshot {
    pub credential: String,
    pub local_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub poll_interval: f64,
}

impl ConfigSnapshot {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(
            self.poll_interval
                .clamp(*POLL_INTERVAL_RANGE.start(), *POLL_INTERVAL_RANGE.end()),
        )
    }

    /// Target for remote calls made with this snapshot.
    pub fn remote_target(&self) -> RemoteTarget {
        RemoteTarget::for_local_dir(self.credential.clone(), &self.local_dir)
    }

    /// Name of the manifest file, excluded from local scans.
    pub fn manifest_file_name(&self) -> Option<&str> {
        self.manifest_path.file_name().and_then(|n| n.to_str())
    }

    /// Compares with an earlier snapshot.
    pub fn changes_from(&self, previous: &ConfigSnapshot) -> SnapshotChanges {
        SnapshotChanges {
            credential: self.credential != previous.credential,
            poll_interval: self.poll_interval != previous.poll_interval,
            local_dir: self.local_dir != previous.local_dir,
        }
    }
}

impl std::fmt::Debug for ConfigSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigSnapshot")
            .field("credential", &"<redacted>")
            .field("local_dir", &self.local_dir)
            .field("manifest_path", &self.manifest_path)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

/// Supplies fresh configuration snapshots on demand.
pub trait ConfigSource: Send + Sync {
    fn snapshot(&self) -> anyhow::Result<ConfigSnapshot>;
}

/// Re-reads and validates a YAML config file on every call.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for FileConfigSource {
    fn snapshot(&self) -> anyhow::Result<ConfigSnapshot> {
        let config = Config::load(&self.path)?;
        let errors = config.validate();
        if !errors.is_empty() {
            let joined: Vec<String> = errors.iter().map(ToString::to_string).collect();
            anyhow::bail!("invalid configuration: {}", joined.join("; "));
        }
        Ok(config.snapshot())
    }
}

/// A fixed snapshot, for one-shot runs and tests.
impl ConfigSource for ConfigSnapshot {
    fn snapshot(&self) -> anyhow::Result<ConfigSnapshot> {
        Ok(self.clone())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
