//! Session (auth) state
//!
//! Tracks who is logged in. Tokens live in [`TokenStorage`]; the user record
//! is persisted next to them under [`AUTH_STATE_KEY`] so a restart can show
//! the last user before the profile is re-fetched.

use crate::client::SkillverseClient;
use crate::client::error::ClientError;
use crate::types::{LoginRequest, RegisterRequest, User};
use serde::{Deserialize, Serialize};
use skillverse_core::ErrorContext;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info, warn};

pub const AUTH_STATE_KEY: &str = "skillverse-auth";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthState {
    user: Option<User>,
    is_authenticated: bool,
}

pub struct SessionStore {
    client: SkillverseClient,
    user: RwLock<Option<User>>,
}

impl SessionStore {
    /// Create a session over `client`, loading any persisted user
    pub fn new(client: SkillverseClient) -> Self {
        let user = Self::load_state(&client).user;
        Self {
            client,
            user: RwLock::new(user),
        }
    }

    pub const fn client(&self) -> &SkillverseClient {
        &self.client
    }

    /// Log in and store the returned credentials
    pub async fn login(&self, email: &str, password: &str) -> Result<User, ClientError> {
        let credentials = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response = self.client.login(&credentials).await?;
        self.establish(&response.access_token, &response.refresh_token, response.user.clone());
        info!(user_id = %response.user.id, "Logged in");
        Ok(response.user)
    }

    /// Create an account and log straight in
    pub async fn register(&self, request: &RegisterRequest) -> Result<User, ClientError> {
        let response = self.client.register(request).await?;
        self.establish(&response.access_token, &response.refresh_token, response.user.clone());
        info!(user_id = %response.user.id, "Registered");
        Ok(response.user)
    }

    /// Forget the user and both tokens
    pub fn logout(&self) {
        self.client.tokens().clear_tokens();
        self.set_user(None);
        debug!("Logged out");
    }

    /// Re-validate a stored session on start-up
    ///
    /// Without both tokens there is nothing to restore. Otherwise the
    /// profile is fetched; any failure ends the session.
    pub async fn restore(&self) -> Option<User> {
        if !self.client.tokens().has_tokens() {
            if self.current_user().is_some() {
                self.set_user(None);
            }
            return None;
        }

        match self.client.profile().await {
            Ok(user) => {
                self.set_user(Some(user.clone()));
                debug!(user_id = %user.id, "Session restored");
                Some(user)
            }
            Err(e) => {
                warn!(error = %e, "Could not restore session");
                self.logout();
                None
            }
        }
    }

    /// Replace the cached user, e.g. after a profile update
    pub fn update_user(&self, user: User) {
        self.set_user(Some(user));
    }

    pub fn current_user(&self) -> Option<User> {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_user().is_some() && self.client.tokens().has_tokens()
    }

    fn establish(&self, access_token: &str, refresh_token: &str, user: User) {
        if !self.client.tokens().set_tokens(access_token, refresh_token) {
            warn!("Tokens could not be persisted; the session will not survive a restart");
        }
        self.set_user(Some(user));
    }

    fn set_user(&self, user: Option<User>) {
        let state = AuthState {
            is_authenticated: user.is_some(),
            user: user.clone(),
        };
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = user;

        let store = self.client.tokens().store();
        let result = serde_json::to_string(&state)
            .with_context_str("encoding")
            .and_then(|raw| store.set(AUTH_STATE_KEY, &raw).with_context_str("writing"));
        if let Err(e) = result {
            warn!("Failed to persist auth state: {}", e);
        }
    }

    fn load_state(client: &SkillverseClient) -> AuthState {
        match client.tokens().store().get(AUTH_STATE_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Discarding unreadable auth state: {}", e);
                AuthState::default()
            }),
            Ok(None) => AuthState::default(),
            Err(e) => {
                warn!("Failed to read auth state: {}", e);
                AuthState::default()
            }
        }
    }
}
