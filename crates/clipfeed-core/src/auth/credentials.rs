use anyhow::{Context, Result};
use keyring::Entry;

use super::session::{PersistedSession, SessionStore};

const SERVICE_NAME: &str = "clipfeed";

/// Keychain account under which the session record is kept
const SESSION_ACCOUNT: &str = "session";

/// Persists the session in the OS keychain.
///
/// The credential and identity are serialized into a single secret so the
/// keychain never holds one without the other.
pub struct KeyringSessionStore {
    account: String,
}

impl KeyringSessionStore {
    pub fn new() -> Self {
        Self {
            account: SESSION_ACCOUNT.to_string(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &self.account).context("Failed to create keyring entry")
    }
}

impl Default for KeyringSessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for KeyringSessionStore {
    fn load(&self) -> Result<Option<PersistedSession>> {
        let secret = match self.entry()?.get_password() {
            Ok(secret) => secret,
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(e) => return Err(e).context("Failed to retrieve session from keychain"),
        };
        let session = serde_json::from_str(&secret)
            .context("Failed to parse session stored in keychain")?;
        Ok(Some(session))
    }

    fn save(&self, session: &PersistedSession) -> Result<()> {
        let secret = serde_json::to_string(session)?;
        self.entry()?
            .set_password(&secret)
            .context("Failed to store session in keychain")?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete session from keychain"),
        }
    }
}
