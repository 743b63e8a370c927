//! Configuration for fhirsync.
//!
//! [`AppConfig`] is read by [`loader::load_config`] from an optional TOML
//! file (`fhirsync.toml` by default) overlaid with `FHIRSYNC__SECTION__KEY`
//! environment variables, then validated.
//!
//! ```toml
//! [remote]
//! base_url = "https://fhir.example.org/r4"
//! bearer_token = "..."
//!
//! [sync]
//! interval_secs = 900
//! permanent_failure_statuses = [400, 410, 422]
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod loader;

pub use loader::{DEFAULT_CONFIG_FILE, ENV_PREFIX, load_config, load_config_with_env};

/// Error types for configuration operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Config build error: {0}")]
    Build(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl ConfigError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

pub use fhirsync_core::{
    DOCUMENT_ATTACHMENT_PATH as DEFAULT_ATTACHMENT_PATH,
    PENDING_FILE_EXTENSION_URL as DEFAULT_PENDING_FILE_EXTENSION_URL,
};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        // Remote validations
        let base = url::Url::parse(&self.remote.base_url).map_err(|e| {
            ConfigError::validation(format!("remote.base_url is not a valid URL: {e}"))
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ConfigError::validation(
                "remote.base_url must use http or https",
            ));
        }
        if self.remote.connect_timeout_ms == 0 || self.remote.request_timeout_ms == 0 {
            return Err(ConfigError::validation("remote timeouts must be > 0"));
        }
        if self.remote.bearer_token.is_some() && self.remote.username.is_some() {
            return Err(ConfigError::validation(
                "remote.bearer_token and remote.username are mutually exclusive",
            ));
        }
        if self.remote.password.is_some() && self.remote.username.is_none() {
            return Err(ConfigError::validation(
                "remote.password requires remote.username",
            ));
        }
        // Sync validations
        if self.sync.interval_secs == 0 {
            return Err(ConfigError::validation("sync.interval_secs must be > 0"));
        }
        if let Some(status) = self
            .sync
            .permanent_failure_statuses
            .iter()
            .find(|s| !(400..600).contains(*s))
        {
            return Err(ConfigError::validation(format!(
                "sync.permanent_failure_statuses must be 4xx or 5xx, got {status}"
            )));
        }
        if self.sync.attachment_path.trim().is_empty() {
            return Err(ConfigError::validation("sync.attachment_path must not be empty"));
        }
        if self.sync.pending_file_extension_url.trim().is_empty() {
            return Err(ConfigError::validation(
                "sync.pending_file_extension_url must not be empty",
            ));
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(ConfigError::validation(format!(
                "logging.level must be one of {valid_levels:?}"
            )));
        }
        Ok(())
    }

    /// Renders the configuration as TOML with secrets masked.
    pub fn to_redacted_toml(&self) -> Result<String> {
        let mut shown = self.clone();
        let mask = |v: &mut Option<String>| {
            if v.is_some() {
                *v = Some("***".to_string());
            }
        };
        mask(&mut shown.remote.password);
        mask(&mut shown.remote.bearer_token);
        Ok(toml::to_string_pretty(&shown)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub bearer_token: Option<String>,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl RemoteConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            username: None,
            password: None,
            bearer_token: None,
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080/fhir".into()
}
fn default_connect_timeout_ms() -> u64 {
    10_000
}
fn default_request_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory of the local resource store.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Root that relative file locators resolve against.
    #[serde(default = "default_files_dir")]
    pub files_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            files_dir: default_files_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("fhirsync-data/resources")
}
fn default_files_dir() -> PathBuf {
    PathBuf::from("fhirsync-data/files")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Extra attempts of a failed pass within one worker invocation.
    #[serde(default = "default_max_task_retries")]
    pub max_task_retries: u32,
    /// Base delay between attempts; attempt `n` waits `n * retry_backoff_ms`.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_attachment_path")]
    pub attachment_path: String,
    /// Binary upload statuses after which the local record is discarded.
    #[serde(default = "default_permanent_failure_statuses")]
    pub permanent_failure_statuses: Vec<u16>,
    #[serde(default = "default_pending_file_extension_url")]
    pub pending_file_extension_url: String,
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_task_retries: default_max_task_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            attachment_path: default_attachment_path(),
            permanent_failure_statuses: default_permanent_failure_statuses(),
            pending_file_extension_url: default_pending_file_extension_url(),
        }
    }
}

fn default_interval_secs() -> u64 {
    900
}
fn default_max_task_retries() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    5_000
}
fn default_attachment_path() -> String {
    DEFAULT_ATTACHMENT_PATH.into()
}
fn default_permanent_failure_statuses() -> Vec<u16> {
    vec![400, 410, 422]
}
fn default_pending_file_extension_url() -> String {
    DEFAULT_PENDING_FILE_EXTENSION_URL.into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON log lines instead of human-readable text.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}
