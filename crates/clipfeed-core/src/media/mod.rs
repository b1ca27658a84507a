//! Media access for video playback.
//!
//! Stored video URLs are not playable; the API hands out short-lived signed
//! URLs instead. `MediaResolver` fetches one per consumer and guards against
//! late responses for a video the consumer has moved away from.

pub mod resolver;

pub use resolver::{MediaAccess, MediaResolver, UNAVAILABLE_MESSAGE};
