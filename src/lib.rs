//! LISA Rust Client Library
//!
//! A Rust client for the LISA license monitoring backend. It keeps the
//! session in cookies, logs out when the token expires or is rejected, and
//! gives access to licenses, email recipients and the report schedule.

pub mod config;
pub mod error;

use std::sync::Arc;

use reqwest::Client;

pub use lisa_rust_auth as auth;
pub use lisa_rust_licenses as licenses;
pub use lisa_rust_notifications as notifications;

use crate::auth::{
    ApiClient, AutoLoginOutcome, Clock, CookieJar, CookieStore, FileCookieStore, FrameProbe,
    LaunchContext, MemoryCookieStore, Navigator, Notifier, SessionManager, SystemClock,
};
use crate::config::ClientOptions;
use crate::error::Error;
use crate::licenses::LicensesClient;
use crate::notifications::{RecipientsClient, ScheduleClient};

/// The main entry point for the LISA client
#[derive(Debug, Clone)]
pub struct Lisa {
    /// HTTP client used for requests
    pub http_client: Client,
    /// Client options
    pub options: ClientOptions,
    session: SessionManager,
    api: ApiClient,
}

/// Overrides for the pieces a [`Lisa`] client is assembled from
#[derive(Default)]
pub struct LisaBuilder {
    options: ClientOptions,
    clock: Option<Arc<dyn Clock>>,
    store: Option<Arc<dyn CookieStore>>,
    notifier: Option<Arc<dyn Notifier>>,
    navigator: Option<Arc<dyn Navigator>>,
}

impl LisaBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Cookie store to use instead of the one named by the options
    pub fn cookie_store(mut self, store: Arc<dyn CookieStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn build(self) -> Result<Lisa, Error> {
        let options = self.options;

        let mut http = Client::builder();
        if let Some(timeout) = options.request_timeout {
            http = http.timeout(timeout);
        }
        let http_client = http.build()?;

        let store: Arc<dyn CookieStore> = match (self.store, &options.cookie_file) {
            (Some(store), _) => store,
            (None, Some(path)) => Arc::new(FileCookieStore::open(path)?),
            (None, None) => Arc::new(MemoryCookieStore::new()),
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let jar = CookieJar::new(store, clock);

        let mut builder = SessionManager::builder(&options.base_url, jar)
            .http_client(http_client.clone())
            .options(options.auth_options());
        if let Some(notifier) = self.notifier {
            builder = builder.notifier(notifier);
        }
        if let Some(navigator) = self.navigator {
            builder = builder.navigator(navigator);
        }
        let session = builder.build();

        let api = ApiClient::new(&options.base_url, http_client.clone(), session.clone());

        Ok(Lisa {
            http_client,
            options,
            session,
            api,
        })
    }
}

impl Lisa {
    /// Create a new LISA client
    ///
    /// Must be called inside a Tokio runtime so the session expiry timer can
    /// be scheduled.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use lisa_rust::{Lisa, config::ClientOptions};
    ///
    /// # async fn run() -> Result<(), lisa_rust::error::Error> {
    /// let lisa = Lisa::new(ClientOptions::from_env()?)?;
    /// lisa.auth().sign_in("user", "password").await?;
    /// let page = lisa.licenses().list_all().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(options: ClientOptions) -> Result<Self, Error> {
        Self::builder(options).build()
    }

    pub fn builder(options: ClientOptions) -> LisaBuilder {
        LisaBuilder {
            options,
            ..LisaBuilder::default()
        }
    }

    /// The session manager for login, logout and session state
    pub fn auth(&self) -> &SessionManager {
        &self.session
    }

    /// Authorized access to arbitrary backend endpoints
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn licenses(&self) -> LicensesClient {
        LicensesClient::new(self.api.clone())
    }

    pub fn recipients(&self) -> RecipientsClient {
        RecipientsClient::new(self.api.clone())
    }

    pub fn schedules(&self) -> ScheduleClient {
        ScheduleClient::new(self.api.clone())
    }

    /// Runs the start-up checks for a launch URL, attempting the automatic
    /// login when it carries a UUID
    pub async fn launch(&self, launch_url: &str) -> Result<AutoLoginOutcome, Error> {
        let launch = LaunchContext::parse(launch_url)?;
        Ok(self.session.on_launch(&launch).await)
    }

    /// Like [`Lisa::launch`], recording whether the client runs embedded
    pub async fn launch_in(
        &self,
        launch_url: &str,
        probe: &dyn FrameProbe,
    ) -> Result<(LaunchContext, AutoLoginOutcome), Error> {
        let launch = LaunchContext::parse(launch_url)?.with_embedding(probe);
        let outcome = self.session.on_launch(&launch).await;
        Ok((launch, outcome))
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::auth::{
        AutoLoginOutcome, LaunchContext, LogoutReason, SessionEvent, SessionManager,
    };
    pub use crate::config::ClientOptions;
    pub use crate::error::Error;
    pub use crate::licenses::{License, LicenseDraft, LicenseStatus, ListQuery};
    pub use crate::notifications::{EmailType, RecipientForm, Schedule};
    pub use crate::Lisa;
}
