//! # Remote Backend
//!
//! The three calls the sync layer makes to the central backend, behind the
//! [`RemoteBackend`] trait, and their HTTP implementation.
//!
//! ## Endpoints
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  submit_transaction  POST {base}/rest/v1/rpc/submit_<domain>_transaction│
//! │                      body: SubmitTransactionRequest (JSON)             │
//! │                      2xx → applied (or already applied for this key)   │
//! │                      else → { code, message }                          │
//! │                                                                         │
//! │  ping                GET  {base}{health_path}                          │
//! │                      any answer below 500 → reachable                  │
//! │                                                                         │
//! │  fetch_items         GET  {base}/rest/v1/<domain>_items?select=*       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The backend deduplicates submissions by `idempotency_key`, so sending the
//! same movement again after a lost response is safe.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use fieldstock_core::{InventoryItem, QueuedTransaction, TransactionType};

use crate::config::{BackendConfig, SyncConfig};
use crate::error::{SyncError, SyncResult};

/// TCP connect deadline. Whole-request deadlines are applied by the callers.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Request Payload
// =============================================================================

/// Arguments of the submission procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitTransactionRequest {
    pub id: String,
    pub item_id: String,
    pub transaction_type: TransactionType,
    pub quantity: f64,
    pub notes: Option<String>,
    pub source_location_id: Option<String>,
    pub destination_location_id: Option<String>,
    pub idempotency_key: String,
    pub device_timestamp: DateTime<Utc>,
    pub user_id: String,
}

impl From<&QueuedTransaction> for SubmitTransactionRequest {
    fn from(tx: &QueuedTransaction) -> Self {
        SubmitTransactionRequest {
            id: tx.id.clone(),
            item_id: tx.item_id.clone(),
            transaction_type: tx.transaction_type,
            quantity: tx.quantity,
            notes: tx.notes.clone(),
            source_location_id: tx.source_location_id.clone(),
            destination_location_id: tx.destination_location_id.clone(),
            idempotency_key: tx.idempotency_key.clone(),
            device_timestamp: tx.device_timestamp,
            user_id: tx.user_id.clone(),
        }
    }
}

// =============================================================================
// Backend Trait
// =============================================================================

/// Calls made against the central backend.
pub trait RemoteBackend: Send + Sync + 'static {
    /// Applies one movement through the named procedure.
    fn submit_transaction(
        &self,
        procedure: &str,
        request: &SubmitTransactionRequest,
    ) -> impl Future<Output = SyncResult<()>> + Send;

    /// Lightweight reachability probe.
    fn ping(&self) -> impl Future<Output = SyncResult<()>> + Send;

    /// Current item records of a domain, for the read cache.
    fn fetch_items(&self, domain: &str)
        -> impl Future<Output = SyncResult<Vec<InventoryItem>>> + Send;
}

// =============================================================================
// HTTP Implementation
// =============================================================================

/// Structured error body returned by the procedure endpoint.
#[derive(Debug, Deserialize)]
struct RemoteErrorBody {
    code: Option<String>,
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

/// Item row as served by `<domain>_items`.
#[derive(Debug, Deserialize)]
struct RemoteItemRow {
    id: String,
    name: String,
    #[serde(default)]
    sku: Option<String>,
    #[serde(default)]
    barcode: Option<String>,
    #[serde(default)]
    current_stock: f64,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl RemoteItemRow {
    fn into_item(self, domain: &str, fetched_at: DateTime<Utc>) -> InventoryItem {
        InventoryItem {
            id: self.id,
            domain: domain.to_string(),
            name: self.name,
            sku: self.sku,
            barcode: self.barcode,
            current_stock: self.current_stock,
            unit: self.unit,
            updated_at: self.updated_at.unwrap_or(fetched_at),
        }
    }
}

/// [`RemoteBackend`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRemoteBackend {
    client: Client,
    base_url: String,
    health_path: String,
    api_key: Option<String>,
}

impl HttpRemoteBackend {
    pub fn new(config: &BackendConfig) -> SyncResult<Self> {
        let parsed = url::Url::parse(&config.base_url)?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(SyncError::InvalidUrl(config.base_url.clone()));
        }

        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;

        Ok(HttpRemoteBackend {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            health_path: config.health_path.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn from_config(config: &SyncConfig) -> SyncResult<Self> {
        Self::new(&config.backend)
    }

    pub fn rpc_url(&self, procedure: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, procedure)
    }

    pub fn items_url(&self, domain: &str) -> String {
        format!("{}/rest/v1/{}_items?select=*", self.base_url, domain)
    }

    pub fn health_url(&self) -> String {
        format!("{}{}", self.base_url, self.health_path)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("apikey", key).bearer_auth(key),
            None => builder,
        }
    }
}

impl RemoteBackend for HttpRemoteBackend {
    async fn submit_transaction(
        &self,
        procedure: &str,
        request: &SubmitTransactionRequest,
    ) -> SyncResult<()> {
        let url = self.rpc_url(procedure);
        debug!(
            procedure = %procedure,
            transaction_id = %request.id,
            idempotency_key = %request.idempotency_key,
            "Submitting movement"
        );

        let resp = self
            .request(Method::POST, &url)
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error(&self.base_url, e))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        Err(remote_error(status, &body))
    }

    async fn ping(&self) -> SyncResult<()> {
        let resp = self
            .request(Method::GET, &self.health_url())
            .send()
            .await
            .map_err(|e| transport_error(&self.base_url, e))?;

        let status = resp.status();
        if status.is_server_error() {
            return Err(SyncError::Http {
                status: status.as_u16(),
                message: status_message(status),
            });
        }
        Ok(())
    }

    async fn fetch_items(&self, domain: &str) -> SyncResult<Vec<InventoryItem>> {
        let resp = self
            .request(Method::GET, &self.items_url(domain))
            .send()
            .await
            .map_err(|e| transport_error(&self.base_url, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(remote_error(status, &body));
        }

        let rows: Vec<RemoteItemRow> = resp.json().await?;
        let fetched_at = Utc::now();
        Ok(rows
            .into_iter()
            .map(|row| row.into_item(domain, fetched_at))
            .collect())
    }
}

// =============================================================================
// Error Mapping
// =============================================================================

fn transport_error(base_url: &str, err: reqwest::Error) -> SyncError {
    if err.is_connect() {
        return SyncError::ConnectionFailed(format!("Cannot reach backend at {base_url}"));
    }
    SyncError::from(err)
}

fn status_message(status: StatusCode) -> String {
    match status.as_u16() {
        401 => "API key is invalid or expired".to_string(),
        403 => "Not authorized for this procedure".to_string(),
        404 => "Procedure not found".to_string(),
        s if s >= 500 => format!("Backend server error (HTTP {s})"),
        s => format!("Unexpected response from backend (HTTP {s})"),
    }
}

/// Maps a non-success response to an error, preferring the structured
/// `{ code, message }` body when the backend sent one.
fn remote_error(status: StatusCode, body: &str) -> SyncError {
    match serde_json::from_str::<RemoteErrorBody>(body) {
        Ok(RemoteErrorBody {
            code,
            message: Some(message),
            details,
        }) => {
            let message = match details {
                Some(details) if !details.is_empty() => format!("{message} ({details})"),
                _ => message,
            };
            SyncError::Remote {
                code: code.unwrap_or_else(|| status.as_u16().to_string()),
                message,
            }
        }
        _ => {
            if !body.trim().is_empty() {
                warn!(status = status.as_u16(), "Unstructured error body from backend");
            }
            SyncError::Http {
                status: status.as_u16(),
                message: status_message(status),
            }
        }
    }
}
