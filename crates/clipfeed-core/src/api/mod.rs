//! REST API client module for the clipfeed video service.
//!
//! This module provides the `ApiClient` for communicating with the
//! video-sharing API (accounts, videos, feeds, follows), plus the
//! backend traits the session and media core are written against.
//!
//! The API uses bearer token authentication obtained from the
//! `/auth/login` endpoint.

pub mod backend;
pub mod client;
pub mod error;

pub use backend::{FollowBackend, MediaBackend, SessionBackend};
pub use client::ApiClient;
pub use error::ApiError;
