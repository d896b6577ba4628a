//! Gateway assembly.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use url::Url;

use crate::auth::AuthApi;
use crate::coordinator::RefreshCoordinator;
use crate::dispatcher::{ApiResponse, Dispatcher, RequestDescriptor};
use crate::error::{GatewayError, Result};
use crate::refresh::{HttpRefreshClient, RefreshClient, RefreshPolicy};
use crate::storage::SessionStorage;
use crate::store::TokenStore;
use crate::terminator::{SessionEvent, SessionTerminator, TerminationHook, event_channel};

/// Default base URL for API requests.
pub const DEFAULT_BASE_URL: &str = "http://localhost:1988/api/v1";

/// Default timeout for requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Authenticated request gateway.
///
/// Cheap to clone; clones share the token store and refresh state.
///
/// # Example
///
/// ```no_run
/// use storefront_gateway::Gateway;
///
/// # async fn example() -> storefront_gateway::Result<()> {
/// let gateway = Gateway::builder()
///     .base_url("https://shop.example.com/api/v1")
///     .build()?;
///
/// gateway.auth().login("mei", "hunter2").await?;
/// let orders: serde_json::Value = gateway.get("orders").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

#[derive(Debug)]
pub(crate) struct GatewayInner {
    pub(crate) store: Arc<TokenStore>,
    pub(crate) coordinator: Arc<RefreshCoordinator>,
    pub(crate) terminator: Arc<SessionTerminator>,
    pub(crate) dispatcher: Dispatcher,
}

impl Gateway {
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    pub(crate) fn inner(&self) -> &GatewayInner {
        &self.inner
    }

    pub fn base_url(&self) -> &Url {
        self.inner.dispatcher.base_url()
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.inner.store
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.inner.coordinator
    }

    /// Subscribe to login, refresh and termination events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.terminator.subscribe()
    }

    /// Access the auth API.
    pub fn auth(&self) -> AuthApi {
        AuthApi::new(self.clone())
    }

    /// Send an arbitrary request.
    pub async fn send(&self, request: &RequestDescriptor) -> Result<ApiResponse> {
        self.inner.dispatcher.send(request).await
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(&RequestDescriptor::get(path)).await?.json()
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = RequestDescriptor::post(path).json_from(body)?;
        self.send(&request).await?.json()
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = RequestDescriptor::put(path).json_from(body)?;
        self.send(&request).await?.json()
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send(&RequestDescriptor::delete(path)).await?;
        Ok(())
    }
}

/// Builder for a [`Gateway`].
pub struct GatewayBuilder {
    base_url: Option<String>,
    timeout: Duration,
    user_agent: Option<String>,
    storage: Option<Arc<dyn SessionStorage>>,
    refresher: Option<Arc<dyn RefreshClient>>,
    policy: RefreshPolicy,
    hooks: Vec<Arc<dyn TerminationHook>>,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self {
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
            storage: None,
            refresher: None,
            policy: RefreshPolicy::default(),
            hooks: Vec::new(),
        }
    }

    /// Set the API base URL. Defaults to [`DEFAULT_BASE_URL`].
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Persist the session in `storage`. Without it the session lives in memory only.
    pub fn storage(mut self, storage: Arc<dyn SessionStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Replace the HTTP refresh client.
    pub fn refresh_client(mut self, refresher: Arc<dyn RefreshClient>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Register a callback run when the session is terminated.
    pub fn termination_hook(mut self, hook: Arc<dyn TerminationHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn build(self) -> Result<Gateway> {
        let raw = self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let mut base_url = Url::parse(raw)?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("storefront-gateway/{}", env!("CARGO_PKG_VERSION")));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .build()
            .map_err(|e| GatewayError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let store = Arc::new(match self.storage {
            Some(storage) => TokenStore::load(storage)?,
            None => TokenStore::in_memory(),
        });

        let terminator = Arc::new(SessionTerminator::new(
            store.clone(),
            self.hooks,
            event_channel(),
        ));

        let refresher: Arc<dyn RefreshClient> = match self.refresher {
            Some(refresher) => refresher,
            None => Arc::new(HttpRefreshClient::new(http.clone(), &base_url, self.timeout)?),
        };

        let coordinator = Arc::new(RefreshCoordinator::new(
            store.clone(),
            refresher,
            terminator.clone(),
            self.policy,
        ));

        let dispatcher = Dispatcher::new(
            http,
            base_url,
            self.timeout,
            store.clone(),
            coordinator.clone(),
        );

        Ok(Gateway {
            inner: Arc::new(GatewayInner {
                store,
                coordinator,
                terminator,
                dispatcher,
            }),
        })
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}
