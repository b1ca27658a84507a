use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::models::Identity;

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Opaque bearer token. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for building an `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// The credential and the identity it authorizes, persisted as one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub credential: Credential,
    pub identity: Identity,
    pub saved_at: DateTime<Utc>,
}

impl PersistedSession {
    pub fn new(credential: Credential, identity: Identity) -> Self {
        Self {
            credential,
            identity,
            saved_at: Utc::now(),
        }
    }

    /// Same credential, fresher identity.
    pub fn with_identity(&self, identity: Identity) -> Self {
        Self::new(self.credential.clone(), identity)
    }
}

/// Durable storage for the credential/identity pair.
///
/// Implementations save and clear the pair as a single unit; a reader must
/// never observe one half without the other.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Option<PersistedSession>>;

    fn save(&self, session: &PersistedSession) -> Result<()>;

    /// Remove any stored pair. Clearing an empty store succeeds.
    fn clear(&self) -> Result<()>;
}

/// Stores the session as JSON in the cache directory.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            path: cache_dir.join(SESSION_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<PersistedSession>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)
            .context("Failed to read session file")?;
        let data: PersistedSession = serde_json::from_str(&contents)
            .context("Failed to parse session file")?;
        Ok(Some(data))
    }

    /// Write to a sibling temp file and rename over the old one.
    fn save(&self, session: &PersistedSession) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(session)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents).context("Failed to write session file")?;
        std::fs::rename(&tmp, &self.path).context("Failed to replace session file")?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Failed to remove session file"),
        }
    }
}

/// In-process store, used by tests and ephemeral front ends.
#[derive(Default)]
pub struct MemorySessionStore {
    slot: Mutex<Option<PersistedSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: PersistedSession) -> Self {
        Self {
            slot: Mutex::new(Some(session)),
        }
    }

    pub fn snapshot(&self) -> Option<PersistedSession> {
        self.slot.lock().clone()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<PersistedSession>> {
        Ok(self.slot.lock().clone())
    }

    fn save(&self, session: &PersistedSession) -> Result<()> {
        *self.slot.lock() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot.lock() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            id: "u1".to_string(),
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("tok-secret");
        assert_eq!(format!("{:?}", credential), "Credential(***)");
        assert_eq!(credential.expose(), "tok-secret");
    }

    #[test]
    fn test_file_store_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(&dir.path().join("cache"));
        assert!(store.load().unwrap().is_none());

        let session = PersistedSession::new(Credential::new("tok-123"), identity());
        store.save(&session).unwrap();
        assert_eq!(store.load().unwrap(), Some(session));
        assert!(!store.path().with_extension("json.tmp").exists());

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        // Clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    fn test_file_store_serializes_token_flat() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        store
            .save(&PersistedSession::new(Credential::new("tok-123"), identity()))
            .unwrap();
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains(r#""credential": "tok-123""#));
    }

    #[test]
    fn test_file_store_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        std::fs::write(store.path(), "{ not json").unwrap();
        assert!(store.load().is_err());
    }

    #[test]
    fn test_with_identity_keeps_credential() {
        let session = PersistedSession::new(Credential::new("tok-1"), identity());
        let mut renamed = identity();
        renamed.username = "alice2".to_string();
        let updated = session.with_identity(renamed);
        assert_eq!(updated.credential, Credential::new("tok-1"));
        assert_eq!(updated.identity.username, "alice2");
    }
}
