//! Plain-text rendering of videos, profiles and session state.

use chrono::{DateTime, Utc};

use clipfeed_core::models::{Identity, UserProfile, Video, Visibility};
use clipfeed_core::{FollowSnapshot, MediaAccess};

/// Widest title shown in list views
const MAX_TITLE_WIDTH: usize = 40;

/// Truncate a string to a maximum length in characters, adding ellipsis if needed
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Human-friendly age such as "just now", "5m ago", "2h ago", "3d ago".
pub fn relative_age(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - then).num_minutes();
    if minutes < 1 {
        // Also covers clock skew
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        if minutes % 60 >= 30 {
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        let days = minutes / 1440;
        if (minutes % 1440) / 60 >= 12 {
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    }
}

fn video_age(video: &Video, now: DateTime<Utc>) -> String {
    video
        .created_at_utc()
        .map(|dt| relative_age(dt, now))
        .unwrap_or_default()
}

/// One feed card: title, age, privacy marker and the preview state.
pub fn video_card(video: &Video, preview: &MediaAccess, now: DateTime<Utc>) -> String {
    let lock = if video.visibility == Visibility::Private { " [private]" } else { "" };
    format!(
        "{:<width$}  {:>8}{}\n    id: {}\n    preview: {}",
        truncate(&video.title, MAX_TITLE_WIDTH),
        video_age(video, now),
        lock,
        video.id,
        preview,
        width = MAX_TITLE_WIDTH,
    )
}

pub fn video_list(heading: &str, cards: &[(Video, MediaAccess)], empty: &str) -> String {
    let now = Utc::now();
    let mut out = format!("{}\n", heading);
    if cards.is_empty() {
        out.push_str(empty);
        out.push('\n');
        return out;
    }
    for (video, preview) in cards {
        out.push_str(&video_card(video, preview, now));
        out.push('\n');
    }
    out
}

/// Detail page: full metadata plus the player URL.
pub fn video_detail(video: &Video, owner: Option<&UserProfile>, player: &MediaAccess) -> String {
    let mut out = format!("{}\n", video.title);
    if let Some(owner) = owner {
        out.push_str(&format!("by {} ({})\n", owner.user.username, owner.user.id));
    }
    out.push_str(&format!("visibility: {}\n", video.visibility));
    if let Some(ref recipe) = video.recipe {
        out.push_str(&format!("recipe:\n{}\n", recipe));
    }
    out.push_str(&format!("play: {}\n", player));
    out
}

pub fn profile(profile: &UserProfile, follow: &FollowSnapshot, video_count: usize, own: bool) -> String {
    let mut out = format!("{}\n", profile.user.username);
    if !profile.user.email.is_empty() {
        out.push_str(&format!("{}\n", profile.user.email));
    }
    out.push_str(&format!(
        "{} videos  {} followers  {} following\n",
        video_count, follow.follower_count, follow.following_count
    ));
    if !own {
        out.push_str(if follow.is_following { "[Following]\n" } else { "[Follow]\n" });
    }
    out
}

pub fn identity(identity: &Identity) -> String {
    let mut out = format!("{} ({})", identity.username, identity.id);
    if !identity.email.is_empty() {
        out.push_str(&format!(" <{}>", identity.email));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn video(title: &str) -> Video {
        Video {
            id: "v1".to_string(),
            title: title.to_string(),
            recipe: None,
            visibility: Visibility::Private,
            blob_name: String::new(),
            blob_url: String::new(),
            user_id: "u1".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Hello", 10), "Hello");
        assert_eq!(truncate("Hello World", 8), "Hello...");
        assert_eq!(truncate("Hi", 2), "Hi");
        assert_eq!(truncate("Crème brûlée tutorial", 8), "Crème...");
    }

    #[test]
    fn test_relative_age() {
        let now = Utc::now();
        assert_eq!(relative_age(now, now), "just now");
        assert_eq!(relative_age(now + Duration::minutes(5), now), "just now");
        assert_eq!(relative_age(now - Duration::minutes(5), now), "5m ago");
        assert_eq!(relative_age(now - Duration::minutes(90), now), "2h ago");
        assert_eq!(relative_age(now - Duration::minutes(80), now), "1h ago");
        assert_eq!(relative_age(now - Duration::hours(36), now), "2d ago");
        assert_eq!(relative_age(now - Duration::hours(30), now), "1d ago");
    }

    #[test]
    fn test_failed_preview_shows_unavailable() {
        let card = video_card(&video("Soup"), &MediaAccess::Failed, Utc::now());
        assert!(card.contains("Video unavailable"));
        assert!(card.contains("[private]"));
    }

    #[test]
    fn test_empty_list_message() {
        let out = video_list("Your Feed", &[], "No videos in your feed yet.");
        assert!(out.ends_with("No videos in your feed yet.\n"));
    }

    #[test]
    fn test_profile_hides_follow_on_own_profile() {
        let p = UserProfile {
            user: Identity {
                id: "u1".to_string(),
                username: "alice".to_string(),
                email: String::new(),
                created_at: String::new(),
            },
            is_following: None,
            follower_count: 2,
            following_count: 1,
        };
        let snapshot = FollowSnapshot::from_profile(&p);
        assert!(!profile(&p, &snapshot, 0, true).contains("[Follow"));
        assert!(profile(&p, &snapshot, 0, false).contains("[Follow]"));
    }
}
