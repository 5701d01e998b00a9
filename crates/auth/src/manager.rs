//! Session manager: the single source of truth for "is this client signed in"
//!
//! Authentication is always recomputed from the cookie jar. The manager adds
//! three things on top of the cookies:
//!
//! - a flag used to emit [`SessionEvent`]s on transitions,
//! - an expiry timer re-derived from the cookies by [`SessionManager::reconcile`],
//! - a one-shot latch around the automatic (UUID) login.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use log::{debug, info, warn};
use reqwest::Client;
use tokio::sync::broadcast;
use url::Url;

use crate::cookies::{CookieJar, CookieOptions, SameSite};
use crate::embedding::LaunchContext;
use crate::notify::{LogNavigator, LogNotifier, Navigator, Notification, Notifier};
use crate::session::{self, Grant, Session};
use crate::timer::{ExpiryTimer, TimerState};
use crate::types::{
    AutoLoginOutcome, AutoLoginState, IframeLoginResponse, LoginRequest, LoginResponse,
    LogoutReason, SessionEvent,
};
use crate::{AuthError, AuthOptions};

#[derive(Debug, Default)]
struct State {
    authenticated: bool,
    timer: ExpiryTimer,
    auto_login: AutoLoginState,
    missing_uuid_reported: bool,
}

struct Inner {
    base_url: String,
    http_client: Client,
    jar: CookieJar,
    options: AuthOptions,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    events: broadcast::Sender<SessionEvent>,
    state: Mutex<State>,
}

/// Builder for [`SessionManager`]
pub struct SessionManagerBuilder {
    base_url: String,
    jar: CookieJar,
    http_client: Option<Client>,
    options: AuthOptions,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
}

impl SessionManagerBuilder {
    pub fn http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn options(mut self, options: AuthOptions) -> Self {
        self.options = options;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    /// Builds the manager and reconciles it with the cookies it finds
    pub fn build(self) -> SessionManager {
        let (events, _) = broadcast::channel(16);
        let authenticated = session::is_authenticated(&self.jar);

        let manager = SessionManager {
            inner: Arc::new(Inner {
                base_url: self.base_url.trim_end_matches('/').to_string(),
                http_client: self.http_client.unwrap_or_default(),
                jar: self.jar,
                options: self.options,
                notifier: self.notifier,
                navigator: self.navigator,
                events,
                state: Mutex::new(State {
                    authenticated,
                    ..State::default()
                }),
            }),
        };

        manager.reconcile();
        manager
    }
}

/// Owns the authentication lifecycle of one client instance
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("base_url", &self.inner.base_url)
            .field("authenticated", &self.lock().authenticated)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn builder(base_url: &str, jar: CookieJar) -> SessionManagerBuilder {
        SessionManagerBuilder {
            base_url: base_url.to_string(),
            jar,
            http_client: None,
            options: AuthOptions::default(),
            notifier: Arc::new(LogNotifier),
            navigator: Arc::new(LogNavigator),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn jar(&self) -> &CookieJar {
        &self.inner.jar
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn options(&self) -> &AuthOptions {
        &self.inner.options
    }

    /// Pure function of the cookies and the clock
    pub fn is_authenticated(&self) -> bool {
        session::is_authenticated(&self.inner.jar)
    }

    /// Current session cookies
    pub fn session(&self) -> Session {
        Session::read(&self.inner.jar)
    }

    /// Bearer token to attach to requests, if any
    pub fn token(&self) -> Option<String> {
        self.session().token
    }

    pub fn timer_state(&self) -> TimerState {
        self.lock().timer.state()
    }

    pub fn auto_login_state(&self) -> AutoLoginState {
        self.lock().auto_login
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        // No receivers is fine
        let _ = self.inner.events.send(event);
    }

    fn notify(&self, notification: Notification) {
        self.inner.notifier.notify(notification);
    }

    /// Marks the session authenticated from cookies the caller has already
    /// written
    pub fn login(&self) {
        self.reconcile();
    }

    /// Deletes all session cookies. Safe to call when already logged out.
    pub fn logout(&self) {
        self.logout_with(LogoutReason::User);
    }

    pub fn logout_with(&self, reason: LogoutReason) {
        if let Err(e) = session::clear(&self.inner.jar) {
            warn!("Session cookies could not all be removed: {}", e);
        }

        let was_authenticated = {
            let mut state = self.lock();
            state.timer.cancel();
            std::mem::replace(&mut state.authenticated, false)
        };

        if was_authenticated {
            info!("Logged out ({:?})", reason);
            self.emit(SessionEvent::LoggedOut(reason));
        }
    }

    /// Re-derives the flag and the expiry timer from the cookies. Any previous
    /// timer is cancelled first, whatever its state.
    pub fn reconcile(&self) {
        let session = self.session();
        let now = self.inner.jar.now_millis();

        if !session.is_valid_at(now) {
            let stale = {
                let mut state = self.lock();
                state.timer.cancel();
                state.authenticated || session.token.is_some()
            };
            if stale {
                debug!("Session no longer valid, logging out");
                self.logout_with(LogoutReason::Expired);
            }
            return;
        }

        let remaining = session.remaining_millis(now);
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);

        let became_authenticated = {
            let mut state = self.lock();
            state.timer.arm(
                session.expires_at,
                Duration::from_millis(remaining as u64),
                move |generation| {
                    if let Some(inner) = weak.upgrade() {
                        SessionManager { inner }.on_timer_fired(generation);
                    }
                },
            );
            !std::mem::replace(&mut state.authenticated, true)
        };

        if became_authenticated {
            info!("Session authenticated, expires in {}ms", remaining);
            self.emit(SessionEvent::Authenticated);
        }
    }

    fn on_timer_fired(&self, generation: u64) {
        if !self.lock().timer.claim(generation) {
            debug!("Ignoring stale expiry timer (generation {})", generation);
            return;
        }
        info!("Session expired");
        self.logout_with(LogoutReason::Expired);
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth{}", self.inner.base_url, path)
    }

    /// Signs in with a username and password. Failures are reported through
    /// the notifier and returned.
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<LoginResponse, AuthError> {
        match self.request_login(username, password).await {
            Ok(response) => {
                self.notify(Notification::success(
                    "Login successful",
                    &format!("Welcome, {}", response.name),
                ));
                self.login();
                Ok(response)
            }
            Err(e) => {
                let description = match &e {
                    AuthError::ApiError { message, .. } => message.clone(),
                    _ => "Please check your credentials".to_string(),
                };
                self.notify(Notification::destructive("Login failed", &description));
                Err(e)
            }
        }
    }

    async fn request_login(&self, username: &str, password: &str) -> Result<LoginResponse, AuthError> {
        let url = self.auth_url("/login");
        let payload = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
            directory: self.inner.options.directory.clone(),
        };

        let response = self
            .inner
            .http_client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AuthError::api(status, error_text, "Login failed"));
        }

        let login: LoginResponse = response.json().await?;
        if login.token.is_empty() {
            return Err(AuthError::MissingField("token"));
        }

        Grant::new(
            login.token.clone(),
            login.expires,
            self.inner.options.default_grant,
            self.inner.jar.now_millis(),
        )
        .with_profile(Some(login.name.clone()), Some(login.group.clone()))
        .persist(&self.inner.jar, SameSite::Lax, false)?;

        if !session::is_authenticated(&self.inner.jar) {
            session::clear(&self.inner.jar)?;
            return Err(AuthError::ExpiredGrant);
        }

        Ok(login)
    }

    /// Exchanges a launch UUID for a session. Runs at most once per manager;
    /// later calls return [`AutoLoginOutcome::Skipped`] without any request.
    /// Never returns an error: failures latch the manager into
    /// [`AutoLoginState::Failed`] and are reported through the notifier.
    pub async fn perform_automatic_login(&self, uuid: &str) -> AutoLoginOutcome {
        if uuid.is_empty() {
            return AutoLoginOutcome::Skipped;
        }

        {
            let mut state = self.lock();
            if state.auto_login != AutoLoginState::NotAttempted {
                debug!("Automatic login already {:?}, skipping", state.auto_login);
                return AutoLoginOutcome::Skipped;
            }
            state.auto_login = AutoLoginState::InFlight;
        }

        match self.exchange_uuid(uuid).await {
            Ok(outcome) => {
                self.lock().auto_login = AutoLoginState::Succeeded;
                outcome
            }
            Err(e) => {
                warn!("Automatic login failed: {}", e);
                self.lock().auto_login = AutoLoginState::Failed;
                let message = match &e {
                    AuthError::ApiError { message, .. } => message.clone(),
                    other => other.to_string(),
                };
                self.notify(Notification::destructive("Login failed", &message));
                AutoLoginOutcome::Failed { message }
            }
        }
    }

    async fn exchange_uuid(&self, uuid: &str) -> Result<AutoLoginOutcome, AuthError> {
        let mut url = Url::parse(&self.auth_url("/iframeLogin"))?;
        url.query_pairs_mut().append_pair("uuid", uuid);

        let response = self
            .inner
            .http_client
            .post(url)
            .header("Content-Type", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AuthError::api(status, error_text, "Login failed"));
        }

        let body: IframeLoginResponse = response.json().await?;

        if let Some(redirect) = body.redirect_url() {
            if let Some(cookie_session) = body.cookie_session.as_deref() {
                let written = self
                    .inner
                    .jar
                    .inject_pairs(cookie_session, &CookieOptions::cross_site())?;
                debug!("Injected {} cookies from cookie_session", written);
            }
            info!("Automatic login redirects to {}", redirect);
            self.inner.navigator.navigate(redirect);
            return Ok(AutoLoginOutcome::Redirect {
                url: redirect.to_string(),
            });
        }

        let token = body.direct_token().ok_or(AuthError::MissingField("data"))?;

        Grant::new(
            token.to_string(),
            None,
            self.inner.options.default_grant,
            self.inner.jar.now_millis(),
        )
        .persist(&self.inner.jar, SameSite::None, true)?;

        self.notify(Notification::success("Login successful", "Welcome"));
        self.login();
        Ok(AutoLoginOutcome::Authenticated)
    }

    /// Runs the start-up checks for a launch: reconciles the session, then
    /// attempts the automatic login when the launch carries a UUID.
    pub async fn on_launch(&self, launch: &LaunchContext) -> AutoLoginOutcome {
        debug!(
            "Launch with {} query params, embedded: {}",
            launch.params.len(),
            launch.embedded
        );
        self.reconcile();

        if self.is_authenticated() {
            return AutoLoginOutcome::Skipped;
        }

        if self.auto_login_state() != AutoLoginState::NotAttempted {
            return AutoLoginOutcome::Skipped;
        }

        if let Some(uuid) = launch.uuid().filter(|_| launch.has_valid_uuid()) {
            return self.perform_automatic_login(uuid).await;
        }

        if !launch.has_valid_uuid() && launch.has_params() {
            let first_report = !std::mem::replace(&mut self.lock().missing_uuid_reported, true);
            if first_report {
                self.notify(Notification::destructive(
                    "UUID not found",
                    "UUID must be registered",
                ));
            }
        }

        AutoLoginOutcome::Skipped
    }
}
