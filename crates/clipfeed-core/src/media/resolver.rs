use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, warn};
use url::Url;

use crate::api::MediaBackend;

/// Fixed text shown in place of a video that could not be resolved.
pub const UNAVAILABLE_MESSAGE: &str = "Video unavailable";

/// What a consumer can render for its current video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaAccess {
    /// No URL yet.
    Pending,
    /// Playable now; do not keep it beyond the consumer's interest.
    Resolved(Url),
    /// Show the unavailable placeholder. Not retried automatically.
    Failed,
}

impl MediaAccess {
    pub fn url(&self) -> Option<&Url> {
        match self {
            MediaAccess::Resolved(url) => Some(url),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, MediaAccess::Pending)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, MediaAccess::Failed)
    }
}

impl std::fmt::Display for MediaAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaAccess::Pending => f.write_str("loading..."),
            MediaAccess::Resolved(url) => write!(f, "{}", url),
            MediaAccess::Failed => f.write_str(UNAVAILABLE_MESSAGE),
        }
    }
}

struct Target {
    generation: u64,
    video_id: Option<String>,
}

/// Resolves playable URLs for one consumer (a feed card, a player).
///
/// Each consumer owns its own resolver. Nothing is cached or shared: signed
/// URLs expire on a schedule the client cannot see, so every `resolve` call
/// fetches afresh. Retargeting or releasing the resolver invalidates any
/// request still in flight.
pub struct MediaResolver {
    backend: Arc<dyn MediaBackend>,
    target: Mutex<Target>,
    state_tx: watch::Sender<MediaAccess>,
}

impl MediaResolver {
    pub fn new(backend: Arc<dyn MediaBackend>) -> Self {
        let (state_tx, _) = watch::channel(MediaAccess::Pending);
        Self {
            backend,
            target: Mutex::new(Target {
                generation: 0,
                video_id: None,
            }),
            state_tx,
        }
    }

    pub fn state(&self) -> MediaAccess {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<MediaAccess> {
        self.state_tx.subscribe()
    }

    /// The video this resolver currently serves.
    pub fn target(&self) -> Option<String> {
        self.target.lock().video_id.clone()
    }

    /// Point the resolver at `video_id` and fetch a playable URL.
    ///
    /// Returns the applied state, or `None` when the resolver was retargeted
    /// or released before the response arrived (the response is dropped).
    pub async fn resolve(&self, video_id: &str) -> Option<MediaAccess> {
        let generation = {
            let mut target = self.target.lock();
            target.generation += 1;
            target.video_id = Some(video_id.to_string());
            self.state_tx.send_replace(MediaAccess::Pending);
            target.generation
        };

        let outcome = if video_id.trim().is_empty() {
            warn!("Empty video id, nothing to resolve");
            MediaAccess::Failed
        } else {
            match self.backend.resolve_media_access(video_id).await {
                Ok(stream) => match Self::playable(&stream.url) {
                    Some(url) => MediaAccess::Resolved(url),
                    None => {
                        warn!(video_id, "Stream response carried no playable URL");
                        MediaAccess::Failed
                    }
                },
                Err(e) => {
                    warn!(video_id, error = %e, "Failed to resolve media access");
                    MediaAccess::Failed
                }
            }
        };

        let target = self.target.lock();
        if target.generation != generation {
            debug!(video_id, "Discarding media result for stale target");
            return None;
        }
        self.state_tx.send_replace(outcome.clone());
        Some(outcome)
    }

    /// The consumer lost interest: drop any resolved URL and ignore
    /// in-flight responses.
    pub fn release(&self) {
        let mut target = self.target.lock();
        target.generation += 1;
        target.video_id = None;
        self.state_tx.send_replace(MediaAccess::Pending);
    }

    fn playable(raw: &str) -> Option<Url> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let url = Url::parse(raw).ok()?;
        matches!(url.scheme(), "http" | "https").then_some(url)
    }
}
