//! Session lifecycle: startup verification, login, registration, logout.
//!
//! `SessionManager` is the single owner of the credential/identity pair.
//! Every transition goes through one lock-protected commit path, and every
//! transition that starts async work advances a generation counter. Async
//! results are applied only if the generation they captured is still
//! current, so a late response can never resurrect a discarded session.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::api::{ApiError, SessionBackend};
use crate::models::Identity;

use super::session::{Credential, PersistedSession, SessionStore};

/// Observable session state. `Initializing` and `Verifying` mean "not yet
/// known" and must not be treated as signed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Initializing,
    Verifying,
    Anonymous,
    Authenticated(Identity),
}

impl SessionState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity().is_some()
    }

    /// True until a definitive signed-in/signed-out answer exists.
    pub fn is_verifying(&self) -> bool {
        matches!(self, SessionState::Initializing | SessionState::Verifying)
    }

    /// What a protected view should do right now.
    pub fn gate(&self) -> SessionGate {
        match self {
            SessionState::Initializing | SessionState::Verifying => SessionGate::Wait,
            SessionState::Anonymous => SessionGate::Redirect,
            SessionState::Authenticated(identity) => SessionGate::Proceed(identity.clone()),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            SessionState::Initializing => "initializing",
            SessionState::Verifying => "verifying",
            SessionState::Anonymous => "signed out",
            SessionState::Authenticated(_) => "signed in",
        }
    }
}

/// Rendering decision for views that show protected data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionGate {
    /// Verification still running; show a placeholder.
    Wait,
    /// Known to be signed out; send the user to login.
    Redirect,
    Proceed(Identity),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    #[error("Session changed before {action} completed")]
    Superseded { action: &'static str },

    #[error("{0:#}")]
    Rejected(anyhow::Error),
}

impl SessionError {
    /// Message suitable for showing next to a login or registration form.
    pub fn user_message(&self) -> String {
        let SessionError::Rejected(e) = self else {
            return self.to_string();
        };
        match e.downcast_ref::<ApiError>() {
            Some(ApiError::Unauthorized) => "Invalid username or password".to_string(),
            Some(ApiError::Rejected(detail)) => detail.clone(),
            Some(api) if api.is_timeout() => "Connection timed out. Please try again.".to_string(),
            Some(api) if api.is_connect() => {
                "Unable to connect to server. Check your internet connection.".to_string()
            }
            _ => format!("Request failed: {:#}", e),
        }
    }
}

struct Inner {
    generation: u64,
    /// Held while Verifying or Authenticated; always a full pair.
    session: Option<PersistedSession>,
}

pub struct SessionManager {
    backend: Arc<dyn SessionBackend>,
    store: Arc<dyn SessionStore>,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<SessionState>,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn SessionBackend>, store: Arc<dyn SessionStore>) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Initializing);
        Self {
            backend,
            store,
            inner: Mutex::new(Inner {
                generation: 0,
                session: None,
            }),
            state_tx,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state_tx.borrow().identity().cloned()
    }

    /// Bearer token for protected requests; only available once verified.
    pub fn credential(&self) -> Option<Credential> {
        let inner = self.inner.lock();
        if !self.state_tx.borrow().is_authenticated() {
            return None;
        }
        inner.session.as_ref().map(|s| s.credential.clone())
    }

    /// Wait until the session is definitively signed in or signed out.
    pub async fn settled(&self) -> SessionState {
        let mut rx = self.subscribe();
        // Bound to a local so the borrow of `rx` ends before `rx` drops
        let settled = match rx.wait_for(|state| !state.is_verifying()).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        settled
    }

    fn advance(inner: &mut Inner) -> u64 {
        inner.generation += 1;
        inner.generation
    }

    /// The only place state changes. Caller holds the lock.
    fn commit(&self, inner: &mut Inner, session: Option<PersistedSession>, state: SessionState) {
        debug!(generation = inner.generation, state = state.label(), "Session state committed");
        inner.session = session;
        self.state_tx.send_replace(state);
    }

    /// Store writes run under the session lock, so the stored pair follows
    /// commit order.
    fn persist(&self, session: &PersistedSession) {
        if let Err(e) = self.store.save(session) {
            warn!(error = %e, "Failed to persist session");
        }
    }

    fn discard(&self, inner: &mut Inner) {
        if let Err(e) = self.store.clear() {
            error!(error = %e, "Failed to clear persisted session");
        }
        self.commit(inner, None, SessionState::Anonymous);
    }

    /// Restore a persisted session and verify it with the server.
    ///
    /// With nothing persisted this settles on `Anonymous` without any network
    /// call. A rejected or unverifiable credential is dropped silently.
    pub async fn initialize(&self) -> SessionState {
        let (generation, persisted) = {
            let mut inner = self.inner.lock();
            let generation = Self::advance(&mut inner);

            let persisted = match self.store.load() {
                Ok(persisted) => persisted,
                Err(e) => {
                    warn!(error = %e, "Unreadable persisted session, discarding");
                    self.discard(&mut inner);
                    return self.state();
                }
            };

            match persisted {
                None => {
                    debug!("No persisted session");
                    self.commit(&mut inner, None, SessionState::Anonymous);
                    return self.state();
                }
                Some(persisted) => {
                    self.commit(&mut inner, Some(persisted.clone()), SessionState::Verifying);
                    (generation, persisted)
                }
            }
        };

        let result = self.backend.verify_identity(&persisted.credential).await;

        let mut inner = self.inner.lock();
        if inner.generation != generation {
            debug!(generation, current = inner.generation, "Discarding stale verification result");
            return self.state_tx.borrow().clone();
        }

        match result {
            Ok(identity) => {
                info!(user_id = %identity.id, "Session verified");
                let session = persisted.with_identity(identity.clone());
                self.persist(&session);
                self.commit(&mut inner, Some(session), SessionState::Authenticated(identity));
            }
            Err(e) => {
                info!(error = %e, "Persisted credential rejected, signing out");
                self.discard(&mut inner);
            }
        }
        self.state_tx.borrow().clone()
    }

    /// Start a transition that is only valid while signed out.
    fn begin_from_anonymous(&self, action: &'static str) -> Result<u64, SessionError> {
        let mut inner = self.inner.lock();
        let state = self.state_tx.borrow().clone();
        if state != SessionState::Anonymous {
            return Err(SessionError::InvalidTransition {
                action,
                state: state.label(),
            });
        }
        Ok(Self::advance(&mut inner))
    }

    pub async fn login(&self, username_or_email: &str, password: &str) -> Result<Identity, SessionError> {
        let generation = self.begin_from_anonymous("log in")?;

        let result = self.backend.authenticate(username_or_email, password).await;

        let mut inner = self.inner.lock();
        if inner.generation != generation {
            debug!(generation, current = inner.generation, "Discarding stale login result");
            return Err(SessionError::Superseded { action: "log in" });
        }

        match result {
            Ok(grant) => {
                let identity = grant.user;
                let session = PersistedSession::new(Credential::new(grant.access_token), identity.clone());
                self.persist(&session);
                self.commit(&mut inner, Some(session), SessionState::Authenticated(identity.clone()));
                info!(user_id = %identity.id, "Login successful");
                Ok(identity)
            }
            Err(e) => {
                warn!(error = %e, "Login failed");
                Err(SessionError::Rejected(e))
            }
        }
    }

    /// Create an account, then log in with the same username and password.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<Identity, SessionError> {
        let generation = self.begin_from_anonymous("register")?;

        let result = self.backend.register_account(username, email, password).await;

        {
            let inner = self.inner.lock();
            if inner.generation != generation {
                debug!(generation, current = inner.generation, "Discarding stale registration result");
                return Err(SessionError::Superseded { action: "register" });
            }
        }

        match result {
            Ok(identity) => info!(user_id = %identity.id, "Account registered"),
            Err(e) => {
                warn!(error = %e, "Registration failed");
                return Err(SessionError::Rejected(e));
            }
        }

        self.login(username, password).await
    }

    /// Sign out. Synchronous, infallible and offline.
    pub fn logout(&self) {
        let mut inner = self.inner.lock();
        Self::advance(&mut inner);
        self.discard(&mut inner);
        info!("Logged out");
    }

    /// Drop a credential the server no longer accepts (e.g. a 401 on a
    /// protected request).
    pub fn invalidate(&self) {
        let mut inner = self.inner.lock();
        Self::advance(&mut inner);
        self.discard(&mut inner);
        info!("Session revoked by server");
    }
}
