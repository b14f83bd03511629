//! HTTP client for the Discord REST API.

use crate::config::DiscordConfig;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use super::ensure_slash;

#[derive(Debug, Error)]
pub enum DiscordError {
    #[error("{context}: {body}")]
    Status {
        context: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("{context}: error decoding response body: {source}")]
    Decode {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("invalid Discord API URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("token lifetime out of range: {0}s")]
    InvalidExpiry(i64),
}

/// Response from the OAuth2 token endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until `access_token` expires
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// When `access_token` stops being valid, counted from `now`
    pub fn expires_at(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, DiscordError> {
        Duration::try_seconds(self.expires_in)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or(DiscordError::InvalidExpiry(self.expires_in))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordUser {
    pub id: String,
    pub username: String,
    /// "0" for accounts migrated to unique usernames
    #[serde(default = "default_discriminator")]
    pub discriminator: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

fn default_discriminator() -> String {
    "0".to_string()
}

/// A guild ("server") as returned by `/users/@me/guilds`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guild {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub position: i64,
}

/// Calls made against Discord on behalf of a user.
///
/// Every non-success response becomes [`DiscordError::Status`] carrying Discord's response
/// text. Nothing is retried.
#[async_trait]
pub trait DiscordApi: Send + Sync {
    /// Trade an authorization code for tokens
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, DiscordError>;

    /// Trade a refresh token for a new token pair
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, DiscordError>;

    async fn get_user_info(&self, access_token: &str) -> Result<DiscordUser, DiscordError>;

    async fn get_user_guilds(&self, access_token: &str) -> Result<Vec<Guild>, DiscordError>;

    async fn get_guild_channels(&self, access_token: &str, guild_id: &str) -> Result<Vec<Channel>, DiscordError>;
}

pub struct DiscordClient {
    client: Client,
    base_url: Url,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl DiscordClient {
    pub fn new(config: &DiscordConfig) -> Result<Self, DiscordError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            client,
            base_url: ensure_slash(&config.api_base),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
        })
    }

    fn url(&self, path: &str) -> Result<Url, DiscordError> {
        Ok(self.base_url.join(path)?)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, context: &'static str) -> Result<T, DiscordError> {
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("Discord API returned {}: {}", status, body);
            return Err(DiscordError::Status { context, status, body });
        }

        let body_text = response.text().await?;
        serde_json::from_str::<T>(&body_text).map_err(|source| {
            tracing::error!("Failed to parse Discord response as JSON. Error: {}", source);
            tracing::debug!("Response body was: {}", body_text);
            DiscordError::Decode { context, source }
        })
    }

    async fn token_request(&self, params: &[(&str, &str)], context: &'static str) -> Result<TokenResponse, DiscordError> {
        let url = self.url("oauth2/token")?;
        let mut form = vec![
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        form.extend_from_slice(params);

        self.send(self.client.post(url).form(&form), context).await
    }
}

#[async_trait]
impl DiscordApi for DiscordClient {
    #[instrument(skip_all, err)]
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, DiscordError> {
        self.token_request(
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ],
            "Failed to exchange code",
        )
        .await
    }

    #[instrument(skip_all, err)]
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, DiscordError> {
        self.token_request(
            &[("grant_type", "refresh_token"), ("refresh_token", refresh_token)],
            "Failed to refresh token",
        )
        .await
    }

    #[instrument(skip_all, err)]
    async fn get_user_info(&self, access_token: &str) -> Result<DiscordUser, DiscordError> {
        let url = self.url("users/@me")?;
        self.send(self.client.get(url).bearer_auth(access_token), "Failed to get user info")
            .await
    }

    #[instrument(skip_all, err)]
    async fn get_user_guilds(&self, access_token: &str) -> Result<Vec<Guild>, DiscordError> {
        let url = self.url("users/@me/guilds")?;
        let guilds: Vec<Guild> = self
            .send(self.client.get(url).bearer_auth(access_token), "Failed to get user guilds")
            .await?;
        debug!("User is in {} guilds", guilds.len());
        Ok(guilds)
    }

    #[instrument(skip(self, access_token), err)]
    async fn get_guild_channels(&self, access_token: &str, guild_id: &str) -> Result<Vec<Channel>, DiscordError> {
        let url = self.url(&format!("guilds/{guild_id}/channels"))?;
        self.send(self.client.get(url).bearer_auth(access_token), "Failed to get guild channels")
            .await
    }
}
