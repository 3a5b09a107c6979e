//! # Session
//!
//! Who is signed in and which inventory domain is active. The engine asks on
//! every call instead of caching, so sign-out and domain switches take effect
//! on the next enqueue or drain.

use std::sync::RwLock;

use fieldstock_core::validation::validate_domain;
use tracing::info;

use crate::config::SessionConfig;
use crate::error::SyncResult;

/// Read access to the current session.
pub trait SessionProvider: Send + Sync {
    /// Authenticated user, if any.
    fn current_user_id(&self) -> Option<String>;

    /// Selected inventory domain, if any.
    fn selected_domain(&self) -> Option<String>;
}

/// In-memory session, mutable at runtime.
#[derive(Debug, Default)]
pub struct StaticSession {
    user_id: RwLock<Option<String>>,
    domain: RwLock<Option<String>>,
}

impl StaticSession {
    pub fn new(user_id: Option<String>, domain: Option<String>) -> Self {
        StaticSession {
            user_id: RwLock::new(user_id),
            domain: RwLock::new(domain),
        }
    }

    /// Session seeded from the `[session]` config section.
    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.user_id.clone(), config.domain.clone())
    }

    pub fn sign_in(&self, user_id: impl Into<String>) {
        let user_id = user_id.into();
        info!(user_id = %user_id, "User signed in");
        *self.user_id.write().unwrap_or_else(|e| e.into_inner()) = Some(user_id);
    }

    pub fn sign_out(&self) {
        info!("User signed out");
        *self.user_id.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Switches the active domain. The name must be a plain identifier since
    /// it becomes part of the procedure and table names.
    pub fn select_domain(&self, domain: impl Into<String>) -> SyncResult<()> {
        let domain = domain.into();
        validate_domain(&domain)?;
        info!(domain = %domain, "Inventory domain selected");
        *self.domain.write().unwrap_or_else(|e| e.into_inner()) = Some(domain);
        Ok(())
    }

    pub fn clear_domain(&self) {
        *self.domain.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl SessionProvider for StaticSession {
    fn current_user_id(&self) -> Option<String> {
        self.user_id.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn selected_domain(&self) -> Option<String> {
        self.domain.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
