//! # Sync Configuration
//!
//! Configuration management for the sync engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     FIELDSTOCK_BACKEND_URL=https://api.example.com                     │
//! │     FIELDSTOCK_USER_ID=...  FIELDSTOCK_DOMAIN=warehouse                │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/fieldstock/sync.toml (Linux)                             │
//! │     ~/Library/Application Support/com.fieldstock.fieldstock/sync.toml  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     The timing and retry constants below                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [device]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! name = "Scanner 3"
//!
//! [backend]
//! base_url = "https://inventory.example.com"
//! api_key = "..."
//! health_path = "/rest/v1/"
//!
//! [session]
//! user_id = "7c0e..."
//! domain = "warehouse"
//!
//! [sync]
//! interval_ms = 30000
//! transaction_timeout_ms = 15000
//! max_retry_count = 5
//!
//! [connectivity]
//! ping_interval_ms = 60000
//! ping_timeout_ms = 5000
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Constants
// =============================================================================

/// Interval between active reachability probes.
pub const PING_INTERVAL_MS: u64 = 60_000;

/// Deadline for a single reachability probe.
pub const PING_TIMEOUT_MS: u64 = 5_000;

/// Interval of the periodic drain while online with a non-empty queue.
pub const SYNC_INTERVAL_MS: u64 = 30_000;

/// Deadline for a single remote submission.
pub const TRANSACTION_TIMEOUT_MS: u64 = 15_000;

/// Failed attempts after which a movement is quarantined.
pub const MAX_RETRY_COUNT: i64 = 5;

// =============================================================================
// Device Configuration
// =============================================================================

/// Configuration for this device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique device identifier (UUID v4).
    /// Auto-generated on first run if not provided.
    pub id: String,

    /// Human-readable device name (e.g., "Scanner 3", "Dock tablet").
    #[serde(default = "default_device_name")]
    pub name: String,
}

fn default_device_name() -> String {
    "FieldStock Device".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            id: Uuid::new_v4().to_string(),
            name: default_device_name(),
        }
    }
}

// =============================================================================
// Backend Configuration
// =============================================================================

/// Where the remote procedures live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the backend (scheme + host, no trailing path).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key sent as `apikey` + bearer token.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Path probed by the connectivity monitor.
    #[serde(default = "default_health_path")]
    pub health_path: String,
}

fn default_base_url() -> String {
    "http://localhost:54321".to_string()
}

fn default_health_path() -> String {
    "/rest/v1/".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            base_url: default_base_url(),
            api_key: None,
            health_path: default_health_path(),
        }
    }
}

// =============================================================================
// Session Configuration
// =============================================================================

/// Who is signed in and which inventory domain is active.
///
/// Used by the headless agent; the interactive app drives a
/// [`SessionProvider`](crate::session::SessionProvider) directly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default)]
    pub domain: Option<String>,
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Sync behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Periodic drain interval (milliseconds).
    #[serde(default = "default_sync_interval")]
    pub interval_ms: u64,

    /// Deadline for one remote submission (milliseconds).
    #[serde(default = "default_transaction_timeout")]
    pub transaction_timeout_ms: u64,

    /// Failed attempts before quarantine.
    #[serde(default = "default_max_retry_count")]
    pub max_retry_count: i64,

    /// Initial backoff (milliseconds) of the periodic trigger after a cycle
    /// with failures.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Upper bound (milliseconds) of that backoff.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_sync_interval() -> u64 {
    SYNC_INTERVAL_MS
}
fn default_transaction_timeout() -> u64 {
    TRANSACTION_TIMEOUT_MS
}
fn default_max_retry_count() -> i64 {
    MAX_RETRY_COUNT
}
fn default_initial_backoff() -> u64 {
    SYNC_INTERVAL_MS
}
fn default_max_backoff() -> u64 {
    10 * 60 * 1000
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            interval_ms: default_sync_interval(),
            transaction_timeout_ms: default_transaction_timeout(),
            max_retry_count: default_max_retry_count(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

impl SyncSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_millis(self.transaction_timeout_ms)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

// =============================================================================
// Connectivity Settings
// =============================================================================

/// Active reachability probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivitySettings {
    #[serde(default = "default_ping_interval")]
    pub ping_interval_ms: u64,

    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_ms: u64,
}

fn default_ping_interval() -> u64 {
    PING_INTERVAL_MS
}
fn default_ping_timeout() -> u64 {
    PING_TIMEOUT_MS
}

impl Default for ConnectivitySettings {
    fn default() -> Self {
        ConnectivitySettings {
            ping_interval_ms: default_ping_interval(),
            ping_timeout_ms: default_ping_timeout(),
        }
    }
}

impl ConnectivitySettings {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete sync configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub connectivity: ConnectivitySettings,
}

impl SyncConfig {
    /// Creates a new config with defaults and a generated device ID.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.device.id.is_empty() {
            return Err(SyncError::InvalidConfig("device.id must not be empty".into()));
        }

        let url = url::Url::parse(&self.backend.base_url)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(SyncError::InvalidUrl(format!(
                "Backend URL must start with http:// or https://, got: {}",
                self.backend.base_url
            )));
        }

        if !self.backend.health_path.starts_with('/') {
            return Err(SyncError::InvalidConfig(
                "backend.health_path must start with '/'".into(),
            ));
        }

        if let Some(domain) = &self.session.domain {
            fieldstock_core::validation::validate_domain(domain)
                .map_err(|e| SyncError::InvalidConfig(e.to_string()))?;
        }

        if self.sync.max_retry_count < 1 {
            return Err(SyncError::InvalidConfig(
                "max_retry_count must be at least 1".into(),
            ));
        }

        if self.sync.transaction_timeout_ms == 0
            || self.sync.interval_ms == 0
            || self.connectivity.ping_interval_ms == 0
            || self.connectivity.ping_timeout_ms == 0
        {
            return Err(SyncError::InvalidConfig(
                "intervals and timeouts must be greater than 0".into(),
            ));
        }

        if self.sync.initial_backoff_ms > self.sync.max_backoff_ms {
            return Err(SyncError::InvalidConfig(
                "initial_backoff_ms must not exceed max_backoff_ms".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("FIELDSTOCK_DEVICE_ID") {
            debug!(device_id = %id, "Overriding device ID from environment");
            self.device.id = id;
        }

        if let Ok(name) = std::env::var("FIELDSTOCK_DEVICE_NAME") {
            self.device.name = name;
        }

        if let Ok(url) = std::env::var("FIELDSTOCK_BACKEND_URL") {
            debug!(url = %url, "Overriding backend URL from environment");
            self.backend.base_url = url;
        }

        if let Ok(key) = std::env::var("FIELDSTOCK_API_KEY") {
            self.backend.api_key = Some(key);
        }

        if let Ok(user) = std::env::var("FIELDSTOCK_USER_ID") {
            self.session.user_id = Some(user);
        }

        if let Ok(domain) = std::env::var("FIELDSTOCK_DOMAIN") {
            debug!(domain = %domain, "Overriding domain from environment");
            self.session.domain = Some(domain);
        }

        if let Ok(value) = std::env::var("FIELDSTOCK_SYNC_INTERVAL_MS") {
            match value.parse::<u64>() {
                Ok(ms) => self.sync.interval_ms = ms,
                Err(_) => warn!(value = %value, "Ignoring invalid FIELDSTOCK_SYNC_INTERVAL_MS"),
            }
        }

        if let Ok(value) = std::env::var("FIELDSTOCK_MAX_RETRY_COUNT") {
            match value.parse::<i64>() {
                Ok(n) => self.sync.max_retry_count = n,
                Err(_) => warn!(value = %value, "Ignoring invalid FIELDSTOCK_MAX_RETRY_COUNT"),
            }
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "fieldstock", "fieldstock")
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    /// Returns the default database file path.
    pub fn default_database_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.data_dir().join("fieldstock.db"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn device_id(&self) -> &str {
        &self.device.id
    }

    /// Backend base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.backend.base_url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert!(!config.device.id.is_empty());
        assert_eq!(config.sync.max_retry_count, MAX_RETRY_COUNT);
        assert_eq!(config.sync.transaction_timeout(), Duration::from_secs(15));
        assert_eq!(config.connectivity.ping_interval(), Duration::from_secs(60));
        assert_eq!(config.connectivity.ping_timeout(), Duration::from_secs(5));
        assert_eq!(config.sync.interval(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SyncConfig::default();

        config.backend.base_url = "ftp://example.com".into();
        assert!(matches!(config.validate(), Err(SyncError::InvalidUrl(_))));

        config.backend.base_url = "not a url".into();
        assert!(config.validate().unwrap_err().is_config_error());

        config.backend.base_url = "https://inventory.example.com/".into();
        assert!(config.validate().is_ok());
        assert_eq!(config.base_url(), "https://inventory.example.com");

        config.sync.max_retry_count = 0;
        assert!(config.validate().is_err());
        config.sync.max_retry_count = 5;

        config.session.domain = Some("Bad Domain".into());
        assert!(config.validate().is_err());
        config.session.domain = Some("warehouse".into());
        assert!(config.validate().is_ok());

        config.connectivity.ping_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: SyncConfig = toml::from_str(
            r#"
            [device]
            id = "dev-1"

            [backend]
            base_url = "https://api.example.com"

            [session]
            domain = "tools"

            [sync]
            max_retry_count = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.device.id, "dev-1");
        assert_eq!(config.device.name, "FieldStock Device");
        assert_eq!(config.session.domain.as_deref(), Some("tools"));
        assert_eq!(config.session.user_id, None);
        assert_eq!(config.sync.max_retry_count, 3);
        assert_eq!(config.sync.transaction_timeout_ms, TRANSACTION_TIMEOUT_MS);
        assert_eq!(config.connectivity.ping_interval_ms, PING_INTERVAL_MS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_serialization() {
        let config = SyncConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[device]"));
        assert!(toml_str.contains("[backend]"));
        assert!(toml_str.contains("[connectivity]"));

        let back: SyncConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(back.device.id, config.device.id);
    }

    #[test]
    fn test_save_and_load_from_file() {
        let path = std::env::temp_dir()
            .join(format!("fieldstock-test-{}", Uuid::new_v4()))
            .join("sync.toml");

        let mut config = SyncConfig::default();
        config.backend.base_url = "https://api.example.com".into();
        config.sync.interval_ms = 1_000;
        config.save(Some(path.clone())).unwrap();

        let loaded = SyncConfig::load(Some(path.clone())).unwrap();
        assert_eq!(loaded.sync.interval_ms, 1_000);

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}
