//! Optimistic follow/unfollow for a profile.
//!
//! The flip is shown immediately, the API call follows, and a failed call
//! restores the last confirmed counts.

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{info, warn};

use crate::api::FollowBackend;
use crate::models::{Identity, UserProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowSnapshot {
    pub is_following: bool,
    pub follower_count: u64,
    pub following_count: u64,
}

impl FollowSnapshot {
    pub fn from_profile(profile: &UserProfile) -> Self {
        Self {
            is_following: profile.is_following(),
            follower_count: profile.follower_count,
            following_count: profile.following_count,
        }
    }

    fn flipped(&self) -> Self {
        let is_following = !self.is_following;
        let follower_count = if is_following {
            self.follower_count + 1
        } else {
            self.follower_count.saturating_sub(1)
        };
        Self {
            is_following,
            follower_count,
            following_count: self.following_count,
        }
    }
}

#[derive(Error, Debug)]
pub enum FollowError {
    #[error("You cannot follow yourself")]
    OwnProfile,

    #[error("Sign in to follow users")]
    NotSignedIn,

    #[error("Failed to update follow status: {0:#}")]
    Failed(anyhow::Error),
}

struct ToggleState {
    confirmed: FollowSnapshot,
    shown: FollowSnapshot,
    in_flight: bool,
}

/// Follow button state for one profile as seen by one viewer.
pub struct FollowToggle {
    user_id: String,
    viewer_id: Option<String>,
    state: Mutex<ToggleState>,
}

impl FollowToggle {
    pub fn new(profile: &UserProfile, viewer: Option<&Identity>) -> Self {
        let snapshot = FollowSnapshot::from_profile(profile);
        Self {
            user_id: profile.user.id.clone(),
            viewer_id: viewer.map(|v| v.id.clone()),
            state: Mutex::new(ToggleState {
                confirmed: snapshot,
                shown: snapshot,
                in_flight: false,
            }),
        }
    }

    /// What the profile should display right now (possibly tentative).
    pub fn snapshot(&self) -> FollowSnapshot {
        self.state.lock().shown
    }

    pub fn in_flight(&self) -> bool {
        self.state.lock().in_flight
    }

    /// The button is hidden on the viewer's own profile.
    pub fn is_own_profile(&self) -> bool {
        self.viewer_id.as_deref() == Some(self.user_id.as_str())
    }

    /// Flip follow status. A toggle issued while another is in flight is
    /// ignored and returns the current snapshot.
    pub async fn toggle(&self, backend: &dyn FollowBackend) -> Result<FollowSnapshot, FollowError> {
        if self.viewer_id.is_none() {
            return Err(FollowError::NotSignedIn);
        }
        if self.is_own_profile() {
            return Err(FollowError::OwnProfile);
        }

        let tentative = {
            let mut state = self.state.lock();
            if state.in_flight {
                return Ok(state.shown);
            }
            let tentative = state.confirmed.flipped();
            state.shown = tentative;
            state.in_flight = true;
            tentative
        };

        let result = if tentative.is_following {
            backend.follow_user(&self.user_id).await
        } else {
            backend.unfollow_user(&self.user_id).await
        };

        let mut state = self.state.lock();
        state.in_flight = false;
        match result {
            Ok(_) => {
                info!(user_id = %self.user_id, following = tentative.is_following, "Follow status updated");
                state.confirmed = tentative;
                Ok(tentative)
            }
            Err(e) => {
                warn!(user_id = %self.user_id, error = %e, "Follow update failed, reverting");
                state.shown = state.confirmed;
                Err(FollowError::Failed(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::oneshot;

    use crate::models::MessageResponse;

    #[derive(Default)]
    struct FakeFollows {
        fail: AtomicBool,
        follows: AtomicUsize,
        unfollows: AtomicUsize,
        gate: Mutex<Option<oneshot::Receiver<()>>>,
    }

    impl FakeFollows {
        async fn respond(&self) -> anyhow::Result<MessageResponse> {
            let gate = self.gate.lock().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("server error");
            }
            Ok(MessageResponse {
                message: "ok".to_string(),
            })
        }
    }

    #[async_trait]
    impl FollowBackend for FakeFollows {
        async fn follow_user(&self, _user_id: &str) -> anyhow::Result<MessageResponse> {
            self.follows.fetch_add(1, Ordering::SeqCst);
            self.respond().await
        }

        async fn unfollow_user(&self, _user_id: &str) -> anyhow::Result<MessageResponse> {
            self.unfollows.fetch_add(1, Ordering::SeqCst);
            self.respond().await
        }
    }

    fn identity(id: &str) -> Identity {
        Identity {
            id: id.to_string(),
            username: format!("user-{}", id),
            email: String::new(),
            created_at: String::new(),
        }
    }

    fn profile(id: &str, following: Option<bool>, followers: u64) -> UserProfile {
        UserProfile {
            user: identity(id),
            is_following: following,
            follower_count: followers,
            following_count: 4,
        }
    }

    #[test]
    fn test_unfollow_count_saturates() {
        let snapshot = FollowSnapshot {
            is_following: true,
            follower_count: 0,
            following_count: 1,
        };
        assert_eq!(snapshot.flipped().follower_count, 0);
        assert!(!snapshot.flipped().is_following);
    }

    #[tokio::test]
    async fn test_follow_success_keeps_tentative_counts() {
        let backend = FakeFollows::default();
        let toggle = FollowToggle::new(&profile("u2", None, 10), Some(&identity("u1")));

        let snapshot = toggle.toggle(&backend).await.unwrap();
        assert!(snapshot.is_following);
        assert_eq!(snapshot.follower_count, 11);
        assert_eq!(snapshot.following_count, 4);
        assert_eq!(toggle.snapshot(), snapshot);
        assert_eq!(backend.follows.load(Ordering::SeqCst), 1);

        let snapshot = toggle.toggle(&backend).await.unwrap();
        assert!(!snapshot.is_following);
        assert_eq!(snapshot.follower_count, 10);
        assert_eq!(backend.unfollows.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_reverts_to_confirmed() {
        let backend = FakeFollows::default();
        backend.fail.store(true, Ordering::SeqCst);
        let toggle = FollowToggle::new(&profile("u2", Some(true), 5), Some(&identity("u1")));

        let err = toggle.toggle(&backend).await.unwrap_err();
        assert!(matches!(err, FollowError::Failed(_)));
        let snapshot = toggle.snapshot();
        assert!(snapshot.is_following);
        assert_eq!(snapshot.follower_count, 5);
        assert!(!toggle.in_flight());
    }

    #[tokio::test]
    async fn test_tentative_state_visible_and_second_toggle_ignored() {
        let backend = Arc::new(FakeFollows::default());
        let (release, gate) = oneshot::channel();
        *backend.gate.lock() = Some(gate);
        let toggle = Arc::new(FollowToggle::new(&profile("u2", Some(false), 2), Some(&identity("u1"))));

        let task = {
            let toggle = toggle.clone();
            let backend = backend.clone();
            tokio::spawn(async move { toggle.toggle(backend.as_ref()).await })
        };
        while backend.follows.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        assert!(toggle.in_flight());
        assert_eq!(toggle.snapshot().follower_count, 3);

        let ignored = toggle.toggle(backend.as_ref()).await.unwrap();
        assert_eq!(ignored.follower_count, 3);
        assert_eq!(backend.unfollows.load(Ordering::SeqCst), 0);

        release.send(()).unwrap();
        let confirmed = task.await.unwrap().unwrap();
        assert!(confirmed.is_following);
        assert_eq!(toggle.snapshot().follower_count, 3);
    }

    #[tokio::test]
    async fn test_own_profile_and_anonymous_rejected() {
        let backend = FakeFollows::default();
        let own = FollowToggle::new(&profile("u1", None, 0), Some(&identity("u1")));
        assert!(own.is_own_profile());
        assert!(matches!(own.toggle(&backend).await, Err(FollowError::OwnProfile)));

        let anonymous = FollowToggle::new(&profile("u2", None, 0), None);
        assert!(matches!(anonymous.toggle(&backend).await, Err(FollowError::NotSignedIn)));
        assert_eq!(backend.follows.load(Ordering::SeqCst), 0);
    }
}
