//! Data models for clipfeed entities.
//!
//! This module contains the wire types exchanged with the video-sharing API:
//!
//! - `Identity`, `UserProfile`, `AuthGrant`: account and session payloads
//! - `Video`, `Visibility`, `NewVideo`: uploaded videos and upload requests
//! - `MediaStream`: short-lived playable URL for a video
//! - `MessageResponse`: acknowledgement bodies for follow/unfollow

pub mod user;
pub mod video;

pub use user::{AuthGrant, Identity, MessageResponse, UserProfile};
pub use video::{MediaStream, NewVideo, Video, Visibility};

use chrono::{DateTime, NaiveDateTime, Utc};

/// Parse a server timestamp. The API emits ISO-8601, sometimes without an offset
/// (naive values are UTC).
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
