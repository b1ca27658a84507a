use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The authenticated principal as issued by the server (`User` on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Identity {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub created_at: String,
}

impl Identity {
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        super::parse_timestamp(&self.created_at)
    }
}

/// Public profile of any user, including the follow projection for the viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: Identity,
    #[serde(default)]
    pub is_following: Option<bool>,
    #[serde(default)]
    pub follower_count: u64,
    #[serde(default)]
    pub following_count: u64,
}

impl UserProfile {
    pub fn is_following(&self) -> bool {
        self.is_following.unwrap_or(false)
    }
}

/// Login response: bearer token plus the identity it authorizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct AuthGrant {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub user: Identity,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct MessageResponse {
    pub message: String,
}
