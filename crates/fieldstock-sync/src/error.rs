//! # Sync Error Types
//!
//! Error types for sync operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Remote              │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Connection     │  │  Remote { code, msg }   │ │
//! │  │  InvalidUrl     │  │  Timeout        │  │  Http(status)           │ │
//! │  │  ConfigLoad/Save│  │                 │  │  Serialization          │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │    Session      │  │   Validation    │  │      Local              │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  NotAuthenticat.│  │  bad quantity,  │  │  Database               │ │
//! │  │  NoDomainSelect.│  │  missing item   │  │  NotFound / Internal    │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every failed submission counts toward the retry ceiling regardless of its
//! category; [`SyncError::is_retryable`] is informational (logs, UI hints).

use thiserror::Error;

use fieldstock_core::ValidationError;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all possible sync failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Invalid backend URL.
    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Session Errors
    // =========================================================================
    /// No user is signed in on this device.
    #[error("No authenticated user")]
    NotAuthenticated,

    /// No inventory domain is selected.
    #[error("No inventory domain selected")]
    NoDomainSelected,

    // =========================================================================
    // Validation Errors
    // =========================================================================
    /// Movement rejected before it reached the queue.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Backend could not be reached.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Request did not complete in time.
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    // =========================================================================
    // Remote Errors
    // =========================================================================
    /// The remote procedure returned a structured error.
    #[error("Remote error {code}: {message}")]
    Remote { code: String, message: String },

    /// The backend answered with a non-success status and no structured body.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Failed to serialize or deserialize a payload.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    // =========================================================================
    // Local Errors
    // =========================================================================
    /// Database query failed.
    #[error("Database error: {0}")]
    Database(#[from] fieldstock_db::DbError),

    /// Referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Error log entry was already retried or dismissed.
    #[error("Sync error {id} is {status} and cannot be retried")]
    NotRetryable { id: String, status: String },

    /// Internal sync error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            SyncError::ConnectionFailed(err.to_string())
        } else if err.is_builder() {
            SyncError::InvalidUrl(err.to_string())
        } else if err.is_decode() {
            SyncError::SerializationFailed(err.to_string())
        } else {
            SyncError::ConnectionFailed(err.to_string())
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if this error is likely transient.
    ///
    /// ## Retryable Errors
    /// - Connection failures, timeouts
    /// - HTTP 408 / 429 / 5xx
    ///
    /// ## Non-Retryable Errors
    /// - Structured remote rejections (business rule violations)
    /// - Configuration, session and validation errors
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::ConnectionFailed(_) | SyncError::Timeout(_) => true,
            SyncError::Http { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }

    /// Creates a NotFound error.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        SyncError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}
