//! Authentication API client methods

use super::{ClientError, SkillverseClient};
use crate::client::transport::ApiRequest;
use crate::types::{
    AuthResponse, AvatarUploadResponse, ChangePasswordRequest, LoginRequest, ProfileUpdate,
    RegisterRequest, User,
};
use crate::validation::Validate;
use bytes::Bytes;

pub const LOGIN_PATH: &str = "/api/auth/login";
pub const REGISTER_PATH: &str = "/api/auth/register";
pub const REFRESH_PATH: &str = "/api/auth/refresh";
pub const PROFILE_PATH: &str = "/api/auth/profile";
pub const CHANGE_PASSWORD_PATH: &str = "/api/auth/change-password";
pub const AVATAR_PATH: &str = "/api/auth/avatar";

impl SkillverseClient {
    /// Exchange credentials for a token pair
    ///
    /// Sent without a bearer token; a 401 here means bad credentials and
    /// never starts a refresh. The caller decides whether to store the tokens.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<AuthResponse, ClientError> {
        credentials.validate()?;
        let req = ApiRequest::post(LOGIN_PATH).json(credentials)?;
        self.execute_public(req).await
    }

    /// Create an account
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ClientError> {
        request.validate()?;
        let req = ApiRequest::post(REGISTER_PATH).json(request)?;
        self.execute_public(req).await
    }

    /// Get the current user's profile
    pub async fn profile(&self) -> Result<User, ClientError> {
        self.execute(ApiRequest::get(PROFILE_PATH)).await
    }

    /// Update profile fields
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ClientError> {
        let req = ApiRequest::patch(PROFILE_PATH).json(update)?;
        self.execute(req).await
    }

    pub async fn change_password(&self, request: &ChangePasswordRequest) -> Result<(), ClientError> {
        if request.new_password.chars().count() < crate::validation::MIN_PASSWORD_LEN {
            return Err(ClientError::invalid_input(format!(
                "Password must be at least {} characters",
                crate::validation::MIN_PASSWORD_LEN
            )));
        }
        let req = ApiRequest::post(CHANGE_PASSWORD_PATH).json(request)?;
        self.request(req).await?;
        Ok(())
    }

    /// Upload a new avatar image
    pub async fn upload_avatar(
        &self,
        file_name: &str,
        mime: &str,
        bytes: impl Into<Bytes>,
    ) -> Result<AvatarUploadResponse, ClientError> {
        let req = ApiRequest::post(AVATAR_PATH).multipart("avatar", file_name, mime, bytes);
        self.execute(req).await
    }
}
