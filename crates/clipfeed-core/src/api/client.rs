//! API client for communicating with the clipfeed REST API.
//!
//! This module provides the `ApiClient` struct for making authenticated
//! API requests for accounts, videos, feeds and follows.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, multipart, Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use crate::auth::Credential;
use crate::config::Config;
use crate::models::{
    AuthGrant, Identity, MediaStream, MessageResponse, NewVideo, UserProfile, Video,
};

use super::{ApiError, FollowBackend, MediaBackend, SessionBackend};

// ============================================================================
// Constants
// ============================================================================

/// Maximum number of retries for rate-limited (429) requests.
/// 3 retries with exponential backoff usually succeeds without excessive delay.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
}

/// API client for the video service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    token: Option<Arc<str>>,
    initial_backoff: Duration,
}

impl ApiClient {
    /// Create a new API client from configuration
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        let base_url = Url::parse(config.api_base_url())
            .with_context(|| format!("Invalid API base URL: {}", config.api_base_url()))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("API base URL cannot carry paths: {}", base_url);
        }

        Ok(Self {
            client,
            base_url,
            token: None,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, credential: &Credential) -> Self {
        Self {
            client: self.client.clone(), // Cheap clone, shares connection pool
            base_url: self.base_url.clone(),
            token: Some(Arc::from(credential.expose())),
            initial_backoff: self.initial_backoff,
        }
    }

    /// Build an endpoint URL from path segments, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("API base URL cannot carry paths"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref token) = self.token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Send a request, retrying with exponential backoff while rate limited,
    /// and decode the JSON body.
    async fn send_json<T, F>(&self, url: &Url, build: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let response = build()
                .send()
                .await
                .map_err(ApiError::from)
                .with_context(|| format!("Failed to send request to {}", url))?;

            if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(ApiError::RateLimited.into());
                }
                warn!(url = %url, retry = retries, backoff_ms = backoff.as_millis() as u64, "Rate limited, backing off");
                tokio::time::sleep(backoff).await;
                backoff *= 2; // Exponential backoff
                continue;
            }

            let response = Self::check_response(response).await?;
            return response
                .json()
                .await
                .map_err(ApiError::from)
                .with_context(|| format!("Failed to parse JSON response from {}", url));
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let headers = self.auth_headers()?;
        self.send_json(&url, || self.client.get(url.clone()).headers(headers.clone()))
            .await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, url: Url, body: &B) -> Result<T> {
        let headers = self.auth_headers()?;
        self.send_json(&url, || {
            self.client
                .post(url.clone())
                .headers(headers.clone())
                .json(body)
        })
        .await
    }

    async fn delete<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let headers = self.auth_headers()?;
        self.send_json(&url, || self.client.delete(url.clone()).headers(headers.clone()))
            .await
    }

    // ===== Account Methods =====

    /// Exchange username (or email) and password for a bearer token
    pub async fn login(&self, username_or_email: &str, password: &str) -> Result<AuthGrant> {
        let url = self.endpoint(&["auth", "login"])?;
        let form = [("username", username_or_email), ("password", password)];
        let grant: AuthGrant = self
            .send_json(&url, || {
                self.client
                    .post(url.clone())
                    .header(header::ACCEPT, "application/json")
                    .form(&form)
            })
            .await
            .context("Authentication failed")?;
        if grant.access_token.is_empty() {
            return Err(ApiError::InvalidResponse("empty access token".to_string()).into());
        }
        debug!(user_id = %grant.user.id, "Authenticated");
        Ok(grant)
    }

    /// Create a new account
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<Identity> {
        let url = self.endpoint(&["auth", "register"])?;
        let body = RegisterRequest {
            username,
            email,
            password,
        };
        self.post(url, &body).await.context("Registration failed")
    }

    /// Fetch the identity for an explicit credential
    pub async fn current_user(&self, credential: &Credential) -> Result<Identity> {
        let url = self.endpoint(&["auth", "me"])?;
        self.send_json(&url, || {
            self.client
                .get(url.clone())
                .bearer_auth(credential.expose())
        })
        .await
        .context("Failed to verify credential")
    }

    // ===== Video Methods =====

    /// Fetch all public videos
    pub async fn list_videos(&self) -> Result<Vec<Video>> {
        let url = self.endpoint(&["videos"])?;
        let videos: Vec<Video> = self.get(url).await.context("Failed to fetch videos")?;
        debug!(count = videos.len(), "Videos fetched");
        Ok(videos)
    }

    /// Fetch videos from users the current user follows
    pub async fn fetch_feed(&self) -> Result<Vec<Video>> {
        let url = self.endpoint(&["videos", "feed"])?;
        let videos: Vec<Video> = self.get(url).await.context("Failed to fetch feed")?;
        debug!(count = videos.len(), "Feed fetched");
        Ok(videos)
    }

    pub async fn fetch_video(&self, video_id: &str) -> Result<Video> {
        let url = self.endpoint(&["videos", video_id])?;
        self.get(url)
            .await
            .with_context(|| format!("Failed to fetch video {}", video_id))
    }

    /// Fetch a short-lived playable URL for a video
    pub async fn fetch_stream(&self, video_id: &str) -> Result<MediaStream> {
        let url = self.endpoint(&["videos", video_id, "stream"])?;
        self.get(url)
            .await
            .with_context(|| format!("Failed to fetch stream for video {}", video_id))
    }

    /// Upload a video file with its metadata
    pub async fn upload_video(&self, upload: NewVideo) -> Result<Video> {
        let upload = upload.normalized()?;
        let url = self.endpoint(&["videos", "upload"])?;

        let bytes = tokio::fs::read(&upload.file)
            .await
            .with_context(|| format!("Failed to read video file {}", upload.file.display()))?;
        let file_name = upload
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());
        debug!(file = %file_name, bytes = bytes.len(), "Uploading video");

        let mut form = multipart::Form::new()
            .text("title", upload.title.clone())
            .text("visibility", upload.visibility.as_str())
            .part("file", multipart::Part::bytes(bytes).file_name(file_name));
        if let Some(recipe) = upload.recipe.clone() {
            form = form.text("recipe", recipe);
        }

        let response = self
            .client
            .post(url.clone())
            .headers(self.auth_headers()?)
            .multipart(form)
            .send()
            .await
            .map_err(ApiError::from)
            .with_context(|| format!("Failed to send upload to {}", url))?;

        let response = Self::check_response(response).await?;
        response
            .json()
            .await
            .map_err(ApiError::from)
            .context("Failed to parse upload response")
    }

    // ===== User Methods =====

    pub async fn fetch_user_profile(&self, user_id: &str) -> Result<UserProfile> {
        let url = self.endpoint(&["users", user_id])?;
        self.get(url)
            .await
            .with_context(|| format!("Failed to fetch profile for user {}", user_id))
    }

    pub async fn fetch_user_videos(&self, user_id: &str) -> Result<Vec<Video>> {
        let url = self.endpoint(&["users", user_id, "videos"])?;
        self.get(url)
            .await
            .with_context(|| format!("Failed to fetch videos for user {}", user_id))
    }

    pub async fn follow(&self, user_id: &str) -> Result<MessageResponse> {
        let url = self.endpoint(&["users", user_id, "follow"])?;
        self.post(url, &serde_json::json!({}))
            .await
            .with_context(|| format!("Failed to follow user {}", user_id))
    }

    pub async fn unfollow(&self, user_id: &str) -> Result<MessageResponse> {
        let url = self.endpoint(&["users", user_id, "follow"])?;
        self.delete(url)
            .await
            .with_context(|| format!("Failed to unfollow user {}", user_id))
    }
}

#[async_trait]
impl SessionBackend for ApiClient {
    async fn verify_identity(&self, credential: &Credential) -> Result<Identity> {
        self.current_user(credential).await
    }

    async fn authenticate(&self, username_or_email: &str, password: &str) -> Result<AuthGrant> {
        self.login(username_or_email, password).await
    }

    async fn register_account(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Identity> {
        self.register(username, email, password).await
    }
}

#[async_trait]
impl MediaBackend for ApiClient {
    async fn resolve_media_access(&self, video_id: &str) -> Result<MediaStream> {
        self.fetch_stream(video_id).await
    }
}

#[async_trait]
impl FollowBackend for ApiClient {
    async fn follow_user(&self, user_id: &str) -> Result<MessageResponse> {
        self.follow(user_id).await
    }

    async fn unfollow_user(&self, user_id: &str) -> Result<MessageResponse> {
        self.unfollow(user_id).await
    }
}
