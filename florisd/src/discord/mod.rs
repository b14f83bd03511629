//! Discord integration.
//!
//! - [`client`]: the [`DiscordApi`] trait and its `reqwest` implementation, covering the
//!   OAuth2 token endpoint and the read-only user/guild/channel endpoints
//! - Deep link and authorize URL construction, which need no network
//!
//! Handlers hold an `Arc<dyn DiscordApi>` so tests can point the real client at a
//! `wiremock` server.

pub mod client;

pub use client::{Channel, DiscordApi, DiscordClient, DiscordError, DiscordUser, Guild, TokenResponse};

use crate::config::DiscordConfig;
use url::Url;

/// Discord's channel type code for guild text channels
pub const TEXT_CHANNEL_TYPE: i64 = 0;

/// OAuth scopes requested when linking an account
pub const OAUTH_SCOPES: &str = "identify guilds";

/// URI that opens a channel directly in the Discord client
pub fn create_deep_link(server_id: &str, channel_id: &str) -> String {
    format!("discord://discord.com/channels/{server_id}/{channel_id}")
}

/// Make sure a base URL ends in `/` so that `Url::join` appends rather than replaces
pub(crate) fn ensure_slash(url: &Url) -> Url {
    if url.path().ends_with('/') {
        url.clone()
    } else {
        let mut new_url = url.clone();
        let mut path = new_url.path().to_string();
        path.push('/');
        new_url.set_path(&path);
        new_url
    }
}

/// The page users are sent to in order to grant this application access
pub fn authorize_url(config: &DiscordConfig) -> Result<Url, url::ParseError> {
    let mut url = ensure_slash(&config.api_base).join("oauth2/authorize")?;
    url.query_pairs_mut()
        .append_pair("client_id", &config.client_id)
        .append_pair("redirect_uri", &config.redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("scope", OAUTH_SCOPES);
    Ok(url)
}
