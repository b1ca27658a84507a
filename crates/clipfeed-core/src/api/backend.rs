//! Trait seams between the session/media core and the HTTP API.
//!
//! `ApiClient` implements all of them; tests substitute in-memory fakes.

use anyhow::Result;
use async_trait::async_trait;

use crate::auth::Credential;
use crate::models::{AuthGrant, Identity, MediaStream, MessageResponse};

/// Identity operations used by the session manager.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Resolve the identity a credential authorizes. Idempotent.
    async fn verify_identity(&self, credential: &Credential) -> Result<Identity>;

    async fn authenticate(&self, username_or_email: &str, password: &str) -> Result<AuthGrant>;

    /// Create an account. Does not establish a session.
    async fn register_account(&self, username: &str, email: &str, password: &str)
        -> Result<Identity>;
}

/// Playable-URL resolution used by media resolvers.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    async fn resolve_media_access(&self, video_id: &str) -> Result<MediaStream>;
}

/// Follow-graph mutations used by the follow toggle.
#[async_trait]
pub trait FollowBackend: Send + Sync {
    async fn follow_user(&self, user_id: &str) -> Result<MessageResponse>;

    async fn unfollow_user(&self, user_id: &str) -> Result<MessageResponse>;
}
