//! API request/response models for the Discord integration.

use crate::db::models::discord::{DiscordAccountDBResponse, DiscordChannelDBResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

/// Public view of a linked Discord account. Tokens are never returned.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DiscordAccountResponse {
    pub discord_id: String,
    pub username: String,
    pub discriminator: String,
    pub avatar: Option<String>,
}

impl From<DiscordAccountDBResponse> for DiscordAccountResponse {
    fn from(db: DiscordAccountDBResponse) -> Self {
        Self {
            discord_id: db.discord_id,
            username: db.username,
            discriminator: db.discriminator,
            avatar: db.avatar,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DiscordChannelResponse {
    pub channel_id: String,
    pub server_id: String,
    pub name: String,
    /// Discord channel type code; text channels are `0`
    #[serde(rename = "type")]
    pub channel_type: i64,
    pub position: i64,
    pub deep_link: String,
    pub last_accessed: Option<DateTime<Utc>>,
}

impl From<DiscordChannelDBResponse> for DiscordChannelResponse {
    fn from(db: DiscordChannelDBResponse) -> Self {
        Self {
            channel_id: db.channel_id,
            server_id: db.server_id,
            name: db.name,
            channel_type: db.channel_type,
            position: db.position,
            deep_link: db.deep_link,
            last_accessed: db.last_accessed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DiscordServerResponse {
    pub server_id: String,
    pub name: String,
    pub icon: Option<String>,
    /// Text channels only
    pub channels: Vec<DiscordChannelResponse>,
}

#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct DeeplinksQuery {
    /// Maximum number of channels to return (default: 10, max: 100)
    #[param(minimum = 1, maximum = 100)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ChannelAccessQuery {
    pub channel_id: String,
}
