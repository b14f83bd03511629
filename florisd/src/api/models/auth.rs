//! API request/response models for authentication.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// OAuth2 password-grant style login form. `username` carries the email address.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Bearer token issued on login or after linking Discord
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    /// Always `bearer`
    pub token_type: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthorizeUrlResponse {
    pub authorize_url: String,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct DiscordCallbackQuery {
    /// Authorization code handed back by Discord
    pub code: String,
}
