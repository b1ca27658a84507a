//! Authentication module for managing the user session.
//!
//! This module provides:
//! - `SessionManager`: the signed-in/signed-out state machine with startup
//!   verification and stale-result protection
//! - `SessionStore` implementations: `FileSessionStore` (JSON in the cache
//!   directory), `KeyringSessionStore` (OS keychain) and `MemorySessionStore`
//!
//! The credential and identity are always persisted and cleared together.

pub mod credentials;
pub mod manager;
pub mod session;

use std::sync::Arc;

use anyhow::Result;

use crate::config::{Config, SessionStorage};

pub use credentials::KeyringSessionStore;
pub use manager::{SessionError, SessionGate, SessionManager, SessionState};
pub use session::{Credential, FileSessionStore, MemorySessionStore, PersistedSession, SessionStore};

/// Build the session store selected in the configuration.
pub fn open_session_store(config: &Config) -> Result<Arc<dyn SessionStore>> {
    Ok(match config.session_storage {
        SessionStorage::File => Arc::new(FileSessionStore::new(&config.cache_dir()?)),
        SessionStorage::Keyring => Arc::new(KeyringSessionStore::new()),
    })
}
