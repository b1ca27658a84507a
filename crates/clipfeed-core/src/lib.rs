//! Core library for clipfeed: a client for a video-sharing service.
//!
//! - [`api`]: REST client and the backend traits the core is written against
//! - [`auth`]: session state machine and credential persistence
//! - [`media`]: per-consumer resolution of short-lived playable URLs
//! - [`follow`]: optimistic follow/unfollow with rollback
//! - [`models`]: wire types
//! - [`config`]: client configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod follow;
pub mod media;
pub mod models;

pub use api::{ApiClient, ApiError};
pub use auth::{SessionError, SessionGate, SessionManager, SessionState};
pub use config::Config;
pub use follow::{FollowError, FollowSnapshot, FollowToggle};
pub use media::{MediaAccess, MediaResolver};
