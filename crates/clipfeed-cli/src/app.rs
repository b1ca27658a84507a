//! Application state for the clipfeed command-line client.
//!
//! `App` wires the configuration, API client and session manager together
//! and implements each command as a "view" over the core: protected views
//! gate on the session state, and every rendered video gets its own media
//! resolver.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use futures::future::join_all;
use tracing::{debug, warn};

use clipfeed_core::api::{ApiClient, ApiError, MediaBackend};
use clipfeed_core::auth::{self, MemorySessionStore, SessionStore};
use clipfeed_core::models::{Identity, NewVideo, Video, Visibility};
use clipfeed_core::{
    Config, FollowError, FollowToggle, MediaAccess, MediaResolver, SessionGate, SessionManager,
    SessionState,
};

use crate::render;

/// Maximum length for username input.
const MAX_USERNAME_LENGTH: usize = 50;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
const MAX_PASSWORD_LENGTH: usize = 128;

const SESSION_EXPIRED: &str = "Your session has expired. Run `clipfeed login` again.";

pub struct App {
    pub config: Config,
    api: ApiClient,
    session: Arc<SessionManager>,
}

impl App {
    /// Create a new application instance
    pub fn new() -> Result<Self> {
        let mut config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };
        config.apply_env();
        debug!(api = config.api_base_url(), "Config loaded");

        let store: Arc<dyn SessionStore> = match auth::open_session_store(&config) {
            Ok(store) => store,
            Err(e) => {
                warn!(error = %e, "Session storage unavailable, session will not persist");
                Arc::new(MemorySessionStore::new())
            }
        };
        Self::with_store(config, store)
    }

    fn with_store(config: Config, store: Arc<dyn SessionStore>) -> Result<Self> {
        let api = ApiClient::new(&config)?;
        let session = Arc::new(SessionManager::new(Arc::new(api.clone()), store));

        Ok(Self {
            config,
            api,
            session,
        })
    }

    /// Restore and verify any persisted session.
    pub async fn start(&self) -> SessionState {
        self.session.initialize().await
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Gate for protected views: an API client carrying the verified
    /// credential, plus the identity it belongs to.
    async fn authorized(&self) -> Result<(ApiClient, Identity)> {
        let state = self.session.settled().await;
        match state.gate() {
            SessionGate::Proceed(identity) => {
                let credential = self
                    .session
                    .credential()
                    .ok_or_else(|| anyhow!("Session ended, please log in again"))?;
                Ok((self.api.with_token(&credential), identity))
            }
            SessionGate::Redirect => bail!("Not logged in. Run `clipfeed login` first."),
            SessionGate::Wait => bail!("Session is still being verified"),
        }
    }

    /// Drop the session if the server says the credential is no longer valid.
    fn revoke_if_unauthorized(&self, e: &anyhow::Error) -> bool {
        let unauthorized = e
            .downcast_ref::<ApiError>()
            .is_some_and(ApiError::is_unauthorized);
        if unauthorized {
            self.session.invalidate();
        }
        unauthorized
    }

    fn check_revoked<T>(&self, result: Result<T>) -> Result<T> {
        match result {
            Err(e) if self.revoke_if_unauthorized(&e) => bail!(SESSION_EXPIRED),
            other => other,
        }
    }

    pub async fn login(&mut self, username: Option<String>) -> Result<()> {
        let username = match username.or_else(|| self.config.last_username.clone()) {
            Some(name) => name,
            None => prompt_line("Username: ")?,
        };
        if username.is_empty() || username.len() > MAX_USERNAME_LENGTH {
            bail!("Username must be 1-{} characters", MAX_USERNAME_LENGTH);
        }
        let password = prompt_password()?;

        println!("Authenticating...");
        match self.session.login(&username, &password).await {
            Ok(identity) => {
                self.remember_username(&username);
                println!("Logged in as {}", render::identity(&identity));
                Ok(())
            }
            Err(e) => Err(anyhow!(e.user_message())),
        }
    }

    pub async fn register(&mut self, username: &str, email: &str) -> Result<()> {
        if username.is_empty() || username.len() > MAX_USERNAME_LENGTH {
            bail!("Username must be 1-{} characters", MAX_USERNAME_LENGTH);
        }
        if !email.contains('@') {
            bail!("Please enter a valid email address");
        }
        let password = prompt_password()?;
        let confirm = rpassword::prompt_password("Confirm password: ")?;
        if password != confirm {
            bail!("Passwords do not match");
        }

        match self.session.register(username, email, &password).await {
            Ok(identity) => {
                self.remember_username(username);
                println!("Welcome, {}!", render::identity(&identity));
                Ok(())
            }
            Err(e) => Err(anyhow!(e.user_message())),
        }
    }

    pub fn logout(&self) {
        self.session.logout();
        println!("Logged out");
    }

    pub async fn whoami(&self) -> Result<()> {
        let (_, identity) = self.authorized().await?;
        println!("{}", render::identity(&identity));
        Ok(())
    }

    fn remember_username(&mut self, username: &str) {
        self.config.last_username = Some(username.to_string());
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }
    }

    // =========================================================================
    // Videos
    // =========================================================================

    /// Resolve a preview for every card, each through its own resolver.
    async fn with_previews(api: &ApiClient, videos: Vec<Video>) -> Vec<(Video, MediaAccess)> {
        let backend: Arc<dyn MediaBackend> = Arc::new(api.clone());
        let cards = videos.into_iter().map(|video| {
            let resolver = MediaResolver::new(backend.clone());
            async move {
                let preview = resolver.resolve(&video.id).await.unwrap_or(MediaAccess::Pending);
                (video, preview)
            }
        });
        join_all(cards).await
    }

    pub async fn list_videos(&self) -> Result<()> {
        let (api, _) = self.authorized().await?;
        let videos = self.check_revoked(api.list_videos().await)?;
        let cards = Self::with_previews(&api, videos).await;
        print!(
            "{}",
            render::video_list("All Videos", &cards, "No videos yet. Be the first to upload a video!")
        );
        Ok(())
    }

    pub async fn feed(&self) -> Result<()> {
        let (api, _) = self.authorized().await?;
        let videos = self.check_revoked(api.fetch_feed().await)?;
        let cards = Self::with_previews(&api, videos).await;
        print!(
            "{}",
            render::video_list(
                "Your Feed",
                &cards,
                "No videos in your feed yet. Follow users to see their videos here!"
            )
        );
        Ok(())
    }

    pub async fn play(&self, video_id: &str) -> Result<()> {
        let (api, _) = self.authorized().await?;
        let video = self.check_revoked(api.fetch_video(video_id).await)?;
        let owner = match api.fetch_user_profile(&video.user_id).await {
            Ok(profile) => Some(profile),
            Err(e) if self.revoke_if_unauthorized(&e) => bail!(SESSION_EXPIRED),
            Err(e) => {
                debug!(error = %e, "Failed to load video owner");
                None
            }
        };

        let player = MediaResolver::new(Arc::new(api.clone()));
        let access = player.resolve(&video.id).await.unwrap_or(MediaAccess::Pending);
        print!("{}", render::video_detail(&video, owner.as_ref(), &access));
        player.release();
        Ok(())
    }

    pub async fn upload(
        &self,
        file: PathBuf,
        title: String,
        recipe: Option<String>,
        private: bool,
    ) -> Result<()> {
        let (api, _) = self.authorized().await?;
        let mut upload = NewVideo::new(title, file);
        upload.recipe = recipe;
        upload.visibility = if private { Visibility::Private } else { Visibility::Public };

        println!("Uploading...");
        let video = self.check_revoked(api.upload_video(upload).await)?;
        println!("Uploaded \"{}\" ({})", video.title, video.id);
        Ok(())
    }

    // =========================================================================
    // Profiles
    // =========================================================================

    pub async fn profile(&self, user_id: &str) -> Result<()> {
        let (api, viewer) = self.authorized().await?;
        let (profile, videos) = futures::join!(
            api.fetch_user_profile(user_id),
            api.fetch_user_videos(user_id)
        );
        let profile = self.check_revoked(profile)?;
        let videos = self.check_revoked(videos)?;

        let toggle = FollowToggle::new(&profile, Some(&viewer));
        let own = toggle.is_own_profile();
        print!("{}", render::profile(&profile, &toggle.snapshot(), videos.len(), own));

        let cards = Self::with_previews(&api, videos).await;
        let heading = if own { "Your Videos" } else { "Videos" };
        let empty = if own { "You haven't uploaded any videos yet." } else { "No videos yet." };
        print!("{}", render::video_list(heading, &cards, empty));
        Ok(())
    }

    /// Follow (`want = true`) or unfollow a user.
    pub async fn set_following(&self, user_id: &str, want: bool) -> Result<()> {
        let (api, viewer) = self.authorized().await?;
        let profile = self.check_revoked(api.fetch_user_profile(user_id).await)?;
        let toggle = FollowToggle::new(&profile, Some(&viewer));

        if toggle.snapshot().is_following == want {
            let verb = if want { "Already following" } else { "Not following" };
            println!("{} {}", verb, profile.user.username);
            return Ok(());
        }

        let snapshot = match toggle.toggle(&api).await {
            Ok(snapshot) => snapshot,
            Err(FollowError::Failed(e)) if self.revoke_if_unauthorized(&e) => bail!(SESSION_EXPIRED),
            Err(e) => return Err(e.into()),
        };
        let verb = if snapshot.is_following { "Now following" } else { "Unfollowed" };
        println!(
            "{} {} ({} followers)",
            verb, profile.user.username, snapshot.follower_count
        );
        Ok(())
    }
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn prompt_password() -> Result<String> {
    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() || password.len() > MAX_PASSWORD_LENGTH {
        bail!("Password must be 1-{} characters", MAX_PASSWORD_LENGTH);
    }
    Ok(password)
}

#[cfg(test)]
mod tests {
    use super::*;

    use clipfeed_core::auth::{Credential, PersistedSession};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn alice() -> Identity {
        Identity {
            id: "u1".to_string(),
            username: "alice".to_string(),
            email: "alice@x.com".to_string(),
            created_at: String::new(),
        }
    }

    fn app_with_session(server: &MockServer) -> (App, Arc<MemorySessionStore>) {
        let config = Config {
            api_base_url: Some(server.uri()),
            ..Config::default()
        };
        let store = Arc::new(MemorySessionStore::with_session(PersistedSession::new(
            Credential::new("tok-1"),
            alice(),
        )));
        let app = App::with_store(config, store.clone()).unwrap();
        (app, store)
    }

    async fn mount_verified_alice(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/auth/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "u1",
                "username": "alice",
                "email": "alice@x.com"
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_logout_clears_store_without_network() {
        let server = MockServer::start().await;
        let (app, store) = app_with_session(&server);

        app.logout();

        assert!(store.snapshot().is_none());
        assert_eq!(app.session.state(), SessionState::Anonymous);
        let requests = server.received_requests().await.unwrap();
        assert!(requests.is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_follow_ends_session() {
        let server = MockServer::start().await;
        mount_verified_alice(&server).await;
        Mock::given(method("GET"))
            .and(path("/users/u2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "u2",
                "username": "bob",
                "is_following": false,
                "follower_count": 3,
                "following_count": 1
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/users/u2/follow"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let (app, store) = app_with_session(&server);
        assert!(app.start().await.is_authenticated());

        let err = app.set_following("u2", true).await.unwrap_err();
        assert_eq!(err.to_string(), SESSION_EXPIRED);
        assert_eq!(app.session.state(), SessionState::Anonymous);
        assert!(store.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_failed_follow_keeps_session() {
        let server = MockServer::start().await;
        mount_verified_alice(&server).await;
        Mock::given(method("GET"))
            .and(path("/users/u2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "u2",
                "username": "bob",
                "follower_count": 3,
                "following_count": 1
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/users/u2/follow"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (app, store) = app_with_session(&server);
        app.start().await;

        let err = app.set_following("u2", true).await.unwrap_err();
        assert!(err.downcast_ref::<FollowError>().is_some());
        assert!(app.session.state().is_authenticated());
        assert!(store.snapshot().is_some());
    }

    #[tokio::test]
    async fn test_unauthorized_owner_lookup_ends_session() {
        let server = MockServer::start().await;
        mount_verified_alice(&server).await;
        Mock::given(method("GET"))
            .and(path("/videos/v1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "v1",
                "title": "Ramen",
                "user_id": "u2"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/u2"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let (app, store) = app_with_session(&server);
        app.start().await;

        let err = app.play("v1").await.unwrap_err();
        assert_eq!(err.to_string(), SESSION_EXPIRED);
        assert_eq!(app.session.state(), SessionState::Anonymous);
        assert!(store.snapshot().is_none());
    }
}
