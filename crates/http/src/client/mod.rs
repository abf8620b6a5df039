//! SkillVerse HTTP client
//!
//! [`SkillverseClient`] attaches the stored access token to every request and
//! recovers from its expiry: the first request to see a 401 refreshes the
//! token pair while any others that fail meanwhile queue behind it, and each
//! is then replayed once with the new token.

pub mod auth;
pub mod dashboard;
pub mod error;
pub mod fallback;
pub mod learning;
pub mod navigator;
pub mod quizzes;
pub mod refresh;
pub mod skills;
pub mod tokens;
pub mod transport;
pub mod trends;
pub mod whatif;

use error::ClientError;
use fallback::{FallbackTransport, FixtureTransport};
use navigator::{Navigator, NoopNavigator};
use refresh::{RefreshCoordinator, RefreshGuard, RefreshRejection, Ticket};
use serde::de::DeserializeOwned;
use skillverse_core::{KeyValueStore, MemoryStore, Settings};
use std::sync::Arc;
use std::time::Duration;
use tokens::TokenStorage;
use tracing::{Instrument, debug, info, info_span, warn};
use transport::{ApiRequest, ApiResponse, HttpTransport, Transport};

use crate::types::{RefreshRequest, TokenPair};

/// SkillVerse API client
#[derive(Clone)]
pub struct SkillverseClient {
    transport: Arc<dyn Transport>,
    tokens: TokenStorage,
    refresh: Arc<RefreshCoordinator>,
    navigator: Arc<dyn Navigator>,
    base_url: String,
}

impl SkillverseClient {
    /// Create a new client with default configuration
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder
    pub fn builder() -> SkillverseClientBuilder {
        SkillverseClientBuilder::default()
    }

    /// Builder preconfigured from settings
    ///
    /// Development builds answer from fixtures when the backend is
    /// unreachable.
    pub fn builder_from_settings(settings: &Settings) -> SkillverseClientBuilder {
        Self::builder()
            .base_url(settings.api_url())
            .timeout(settings.request_timeout())
            .fixture_fallback(settings.environment.is_dev())
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stored credentials
    pub fn tokens(&self) -> &TokenStorage {
        &self.tokens
    }

    /// Shared refresh state
    pub fn refresh_coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.refresh
    }

    /// Send an authenticated request
    ///
    /// Returns the final response of a 2xx exchange. A 401 is never returned
    /// as a response: it either resolves through the refresh protocol or
    /// becomes [`ClientError::Unauthenticated`] / [`ClientError::RefreshFailed`].
    pub async fn request(&self, mut request: ApiRequest) -> Result<ApiResponse, ClientError> {
        request.strip_authorization();

        let sent_with = self.tokens.access_token();
        let response = self.transport.send(&request, sent_with.as_deref()).await?;

        if response.status != 401 {
            return Self::check(&request, response);
        }

        debug!(path = %request.path, "Received 401, attempting recovery");
        self.recover_unauthorized(&request, sent_with).await
    }

    /// Send an authenticated request and decode the response body
    pub async fn execute<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ClientError> {
        self.request(request).await?.json()
    }

    /// Send a request without credentials or refresh handling
    pub async fn request_public(
        &self,
        mut request: ApiRequest,
    ) -> Result<ApiResponse, ClientError> {
        request.strip_authorization();
        let response = self.transport.send(&request, None).await?;
        Self::check(&request, response)
    }

    /// Send a public request and decode the response body
    pub async fn execute_public<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<T, ClientError> {
        self.request_public(request).await?.json()
    }

    async fn recover_unauthorized(
        &self,
        request: &ApiRequest,
        sent_with: Option<String>,
    ) -> Result<ApiResponse, ClientError> {
        // The token changed while this request was on the wire
        let current = self.tokens.access_token();
        if current.is_some() && current != sent_with && !self.refresh.is_refreshing() {
            debug!(path = %request.path, "Replaying with the current access token");
            return self.replay(request, current.as_deref()).await;
        }

        let access_token = loop {
            match self.refresh.begin_or_enqueue() {
                Ticket::Wait(outcome) => match outcome.await {
                    Ok(Ok(token)) => break token,
                    // The leader went away; take another ticket
                    Ok(Err(RefreshRejection::Cancelled)) | Err(_) => {
                        debug!(path = %request.path, "Token refresh cancelled, retrying");
                    }
                    Ok(Err(rejection)) => return Err(rejection.into()),
                },
                Ticket::Lead(guard) => {
                    break self
                        .run_refresh(guard)
                        .instrument(info_span!("token_refresh"))
                        .await?;
                }
            }
        };

        self.replay(request, Some(&access_token)).await
    }

    /// Exchange the refresh token and settle every queued request
    async fn run_refresh(&self, guard: RefreshGuard<'_>) -> Result<String, ClientError> {
        let Some(refresh_token) = self.tokens.refresh_token() else {
            warn!("No refresh token stored, redirecting to login");
            self.tokens.clear_tokens();
            let rejected = guard.reject(RefreshRejection::MissingRefreshToken);
            debug!(rejected, "Queued requests rejected");
            self.navigator.redirect_to_login();
            return Err(RefreshRejection::MissingRefreshToken.into());
        };

        info!(queued = self.refresh.pending(), "Refreshing access token");

        match self.exchange_refresh_token(refresh_token).await {
            Ok(pair) => {
                if !self.tokens.set_tokens(&pair.access_token, &pair.refresh_token) {
                    warn!("Refreshed tokens could not be persisted");
                }
                let replayed = guard.resolve(pair.access_token.clone());
                info!(replayed, "Access token refreshed");
                Ok(pair.access_token)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, redirecting to login");
                self.tokens.clear_tokens();
                let rejected = guard.reject(RefreshRejection::Failed(e.user_message()));
                debug!(rejected, "Queued requests rejected");
                self.navigator.redirect_to_login();
                Err(ClientError::RefreshFailed(e.user_message()))
            }
        }
    }

    async fn exchange_refresh_token(&self, refresh_token: String) -> Result<TokenPair, ClientError> {
        let request = ApiRequest::post(auth::REFRESH_PATH).json(&RefreshRequest { refresh_token })?;
        let response = self.transport.send(&request, None).await?;
        response.error_for_status()?.json()
    }

    /// Re-issue a request that already failed with 401
    async fn replay(
        &self,
        request: &ApiRequest,
        access_token: Option<&str>,
    ) -> Result<ApiResponse, ClientError> {
        let response = self.transport.send(request, access_token).await?;
        if response.status == 401 {
            warn!(path = %request.path, "Request rejected again after refresh");
            return Err(ClientError::from_status(401, &response.body));
        }
        Self::check(request, response)
    }

    fn check(request: &ApiRequest, response: ApiResponse) -> Result<ApiResponse, ClientError> {
        response.error_for_status().inspect_err(|e| {
            debug!(method = %request.method, path = %request.path, error = %e, "Request failed");
        })
    }
}

/// Builder for SkillverseClient
#[derive(Default)]
pub struct SkillverseClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    store: Option<Arc<dyn KeyValueStore>>,
    navigator: Option<Arc<dyn Navigator>>,
    transport: Option<Arc<dyn Transport>>,
    refresh: Option<Arc<RefreshCoordinator>>,
    fixture_fallback: bool,
}

impl SkillverseClientBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Store holding the token pair; defaults to an in-memory store
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Receiver of redirect-to-login requests
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Replace the reqwest transport
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Share refresh state with other clients using the same store
    pub fn refresh_coordinator(mut self, coordinator: Arc<RefreshCoordinator>) -> Self {
        self.refresh = Some(coordinator);
        self
    }

    /// Answer from fixtures when the backend is unreachable
    pub const fn fixture_fallback(mut self, enabled: bool) -> Self {
        self.fixture_fallback = enabled;
        self
    }

    /// Build the client
    pub fn build(self) -> Result<SkillverseClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(
                base_url.clone(),
                self.timeout,
                self.user_agent,
            )?),
        };

        let transport: Arc<dyn Transport> = if self.fixture_fallback {
            debug!("Fixture fallback enabled");
            Arc::new(FallbackTransport::new(transport, FixtureTransport::new()))
        } else {
            transport
        };

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));

        Ok(SkillverseClient {
            transport,
            tokens: TokenStorage::new(store),
            refresh: self.refresh.unwrap_or_default(),
            navigator: self.navigator.unwrap_or_else(|| Arc::new(NoopNavigator)),
            base_url,
        })
    }
}
