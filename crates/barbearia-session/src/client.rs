//! Session-aware API client.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::api::{AuthApi, InvitesApi, ProfileApi};
use crate::coordinator::{CoordinatorConfig, RefreshCoordinator};
use crate::error::{Result, SessionError};
use crate::events::SessionEvents;
use crate::guards::{GuardConfig, RouteGuards};
use crate::state::SessionState;
use crate::store::{Storage, TokenStore};
use crate::transport::{ApiRequest, ApiResponse, DEFAULT_TIMEOUT, HttpTransport, Transport};

/// Barbearia API client.
///
/// Every call goes through one shared [`RefreshCoordinator`], so tokens are
/// attached and refreshed transparently.
///
/// # Example
///
/// ```no_run
/// use barbearia_session::SessionClient;
///
/// # async fn example() -> barbearia_session::Result<()> {
/// let client = SessionClient::builder()
///     .base_url("http://localhost:8080/api")
///     .build()?;
///
/// client.auth().login("ana@example.com", "secret").await?;
/// let me = client.profile().get().await?;
/// println!("{} ({})", me.name, me.role);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SessionClient {
    coordinator: RefreshCoordinator,
    state: SessionState,
    guard_config: Arc<GuardConfig>,
}

impl SessionClient {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    pub fn store(&self) -> &TokenStore {
        self.coordinator.store()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn events(&self) -> &SessionEvents {
        self.coordinator.events()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // API accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Access the auth API.
    pub fn auth(&self) -> AuthApi {
        AuthApi::new(self.clone())
    }

    /// Access the current user's profile API.
    pub fn profile(&self) -> ProfileApi {
        ProfileApi::new(self.clone())
    }

    /// Access the public invite API.
    pub fn invites(&self) -> InvitesApi {
        InvitesApi::new(self.clone())
    }

    /// Route guards bound to this client's session.
    pub fn guards(&self) -> RouteGuards {
        RouteGuards::new(self.clone(), (*self.guard_config).clone())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // HTTP helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Send a raw request through the coordinator.
    pub async fn dispatch(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.coordinator.dispatch(request).await
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.dispatch(ApiRequest::get(path)).await?.into_result()
    }

    pub(crate) async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.dispatch(ApiRequest::post(path, body)?)
            .await?
            .into_result()
    }

    pub(crate) async fn put<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.dispatch(ApiRequest::put(path, body)?)
            .await?
            .into_result()
    }

    pub(crate) async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.dispatch(ApiRequest::patch(path, body)?)
            .await?
            .into_result()
    }
}

/// Builder for creating a [`SessionClient`].
#[derive(Debug)]
pub struct ClientBuilder {
    base_url: Option<String>,
    timeout: Duration,
    user_agent: Option<String>,
    storage: Option<Arc<dyn Storage>>,
    without_storage: bool,
    transport: Option<Arc<dyn Transport>>,
    coordinator: CoordinatorConfig,
    guards: GuardConfig,
}

impl ClientBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
            storage: None,
            without_storage: false,
            transport: None,
            coordinator: CoordinatorConfig::default(),
            guards: GuardConfig::default(),
        }
    }

    /// Set the API base URL (e.g. `http://localhost:8080/api`).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Use a specific token storage backend. Defaults to process memory.
    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Run without durable storage; tokens are never kept.
    pub fn without_storage(mut self) -> Self {
        self.without_storage = true;
        self
    }

    /// Replace the HTTP transport. The base URL is then ignored.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the login endpoint path.
    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.coordinator.login_path = path.into();
        self
    }

    /// Set the refresh endpoint path.
    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.coordinator.refresh_path = path.into();
        self
    }

    /// Set route guard settings. The guard login route also becomes the
    /// coordinator's entry point.
    pub fn guard_config(mut self, config: GuardConfig) -> Self {
        self.coordinator.entry_point = config.login_route.clone();
        self.guards = config;
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<SessionClient> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => {
                let base_url = self
                    .base_url
                    .ok_or_else(|| SessionError::Config("base_url is required".to_string()))?;

                let mut headers = HeaderMap::new();
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

                let user_agent = self
                    .user_agent
                    .unwrap_or_else(|| format!("barbearia-session/{}", env!("CARGO_PKG_VERSION")));

                let http = reqwest::Client::builder()
                    .default_headers(headers)
                    .user_agent(user_agent)
                    .build()?;

                Arc::new(HttpTransport::new(http, &base_url, self.timeout)?)
            }
        };

        let store = if self.without_storage {
            TokenStore::unavailable()
        } else {
            match self.storage {
                Some(storage) => TokenStore::new(storage),
                None => TokenStore::in_memory(),
            }
        };

        let coordinator = RefreshCoordinator::new(transport, store.clone(), self.coordinator);

        Ok(SessionClient {
            coordinator,
            state: SessionState::new(store),
            guard_config: Arc::new(self.guards),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
