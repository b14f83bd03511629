//! Database models for Discord accounts and the server/channel cache.

use crate::types::UserId;
use chrono::{DateTime, Utc};

/// Link (or re-link) a Discord account to a user
#[derive(Debug, Clone)]
pub struct DiscordAccountUpsertDBRequest {
    pub user_id: UserId,
    pub discord_id: String,
    pub username: String,
    pub discriminator: String,
    pub avatar: Option<String>,
    pub access_token: String,
    pub refresh_token: String,
    pub token_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct DiscordAccountDBResponse {
    pub user_id: UserId,
    pub discord_id: String,
    pub username: String,
    pub discriminator: String,
    pub avatar: Option<String>,
    pub access_token: String,
    pub refresh_token: String,
    pub token_expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DiscordAccountDBResponse {
    pub fn token_expired(&self, now: DateTime<Utc>) -> bool {
        self.token_expires_at < now
    }
}

#[derive(Debug, Clone)]
pub struct DiscordServerUpsertDBRequest {
    pub server_id: String,
    pub name: String,
    pub icon: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DiscordChannelUpsertDBRequest {
    pub channel_id: String,
    pub server_id: String,
    pub name: String,
    pub channel_type: i64,
    pub position: i64,
    pub deep_link: String,
}

#[derive(Debug, Clone)]
pub struct DiscordChannelDBResponse {
    pub channel_id: String,
    pub server_id: String,
    pub name: String,
    pub channel_type: i64,
    pub position: i64,
    pub deep_link: String,
    pub last_accessed: Option<DateTime<Utc>>,
}
