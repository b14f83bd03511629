//! Database repositories for linked Discord accounts and the channel cache.
//!
//! These don't fit the CRUD shape of [`Repository`](super::Repository): accounts are keyed
//! by their user and only ever upserted, and cached servers/channels mirror whatever
//! Discord last returned.

use crate::db::{
    errors::Result,
    models::discord::{
        DiscordAccountDBResponse, DiscordAccountUpsertDBRequest, DiscordChannelDBResponse, DiscordChannelUpsertDBRequest,
        DiscordServerUpsertDBRequest,
    },
};
use crate::types::{UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};
use tracing::instrument;

#[derive(Debug, Clone, FromRow)]
struct DiscordAccount {
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

impl From<DiscordAccount> for DiscordAccountDBResponse {
    fn from(a: DiscordAccount) -> Self {
        Self {
            user_id: a.user_id,
            discord_id: a.discord_id,
            username: a.username,
            discriminator: a.discriminator,
            avatar: a.avatar,
            access_token: a.access_token,
            refresh_token: a.refresh_token,
            token_expires_at: a.token_expires_at,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct DiscordChannel {
    pub channel_id: String,
    pub server_id: String,
    pub name: String,
    pub channel_type: i64,
    pub position: i64,
    pub deep_link: String,
    pub last_accessed: Option<DateTime<Utc>>,
}

impl From<DiscordChannel> for DiscordChannelDBResponse {
    fn from(c: DiscordChannel) -> Self {
        Self {
            channel_id: c.channel_id,
            server_id: c.server_id,
            name: c.name,
            channel_type: c.channel_type,
            position: c.position,
            deep_link: c.deep_link,
            last_accessed: c.last_accessed,
        }
    }
}

pub struct DiscordAccounts<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> DiscordAccounts<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn get_by_user_id(&mut self, user_id: UserId) -> Result<Option<DiscordAccountDBResponse>> {
        let account = sqlx::query_as::<_, DiscordAccount>("SELECT * FROM discord_accounts WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(account.map(Into::into))
    }

    /// Link a Discord account to a user, replacing any previous link
    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id), discord_id = %request.discord_id), err)]
    pub async fn upsert(&mut self, request: &DiscordAccountUpsertDBRequest) -> Result<DiscordAccountDBResponse> {
        let account = sqlx::query_as::<_, DiscordAccount>(
            r#"
            INSERT INTO discord_accounts
                (user_id, discord_id, username, discriminator, avatar, access_token, refresh_token, token_expires_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (user_id) DO UPDATE SET
                discord_id = excluded.discord_id,
                username = excluded.username,
                discriminator = excluded.discriminator,
                avatar = excluded.avatar,
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                token_expires_at = excluded.token_expires_at,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            RETURNING *
            "#,
        )
        .bind(request.user_id)
        .bind(&request.discord_id)
        .bind(&request.username)
        .bind(&request.discriminator)
        .bind(&request.avatar)
        .bind(&request.access_token)
        .bind(&request.refresh_token)
        .bind(request.token_expires_at)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(account.into())
    }

    /// Overwrite the OAuth tokens after a refresh
    #[instrument(skip(self, access_token, refresh_token), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn update_tokens(
        &mut self,
        user_id: UserId,
        access_token: &str,
        refresh_token: &str,
        token_expires_at: DateTime<Utc>,
    ) -> Result<Option<DiscordAccountDBResponse>> {
        let account = sqlx::query_as::<_, DiscordAccount>(
            r#"
            UPDATE discord_accounts SET
                access_token = ?,
                refresh_token = ?,
                token_expires_at = ?,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            WHERE user_id = ?
            RETURNING *
            "#,
        )
        .bind(access_token)
        .bind(refresh_token)
        .bind(token_expires_at)
        .bind(user_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(account.map(Into::into))
    }
}

pub struct DiscordChannels<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> DiscordChannels<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(server_id = %request.server_id), err)]
    pub async fn upsert_server(&mut self, request: &DiscordServerUpsertDBRequest) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO discord_servers (server_id, name, icon)
            VALUES (?, ?, ?)
            ON CONFLICT (server_id) DO UPDATE SET
                name = excluded.name,
                icon = excluded.icon,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            "#,
        )
        .bind(&request.server_id)
        .bind(&request.name)
        .bind(&request.icon)
        .execute(&mut *self.db)
        .await?;

        Ok(())
    }

    /// Insert or refresh a cached channel. `last_accessed` is left as it was.
    #[instrument(skip(self, request), fields(channel_id = %request.channel_id), err)]
    pub async fn upsert_channel(&mut self, request: &DiscordChannelUpsertDBRequest) -> Result<DiscordChannelDBResponse> {
        let channel = sqlx::query_as::<_, DiscordChannel>(
            r#"
            INSERT INTO discord_channels (channel_id, server_id, name, channel_type, position, deep_link)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (channel_id) DO UPDATE SET
                server_id = excluded.server_id,
                name = excluded.name,
                channel_type = excluded.channel_type,
                position = excluded.position,
                deep_link = excluded.deep_link
            RETURNING *
            "#,
        )
        .bind(&request.channel_id)
        .bind(&request.server_id)
        .bind(&request.name)
        .bind(request.channel_type)
        .bind(request.position)
        .bind(&request.deep_link)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(channel.into())
    }

    #[instrument(skip(self), err)]
    pub async fn get(&mut self, channel_id: &str) -> Result<Option<DiscordChannelDBResponse>> {
        let channel = sqlx::query_as::<_, DiscordChannel>("SELECT * FROM discord_channels WHERE channel_id = ?")
            .bind(channel_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(channel.map(Into::into))
    }

    /// Channels by most recent access; never-accessed channels sort last.
    #[instrument(skip(self), err)]
    pub async fn list_recent(&mut self, limit: i64) -> Result<Vec<DiscordChannelDBResponse>> {
        let channels = sqlx::query_as::<_, DiscordChannel>(
            "SELECT * FROM discord_channels ORDER BY last_accessed IS NULL, last_accessed DESC, rowid LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(channels.into_iter().map(Into::into).collect())
    }

    /// Stamp a channel as accessed now. `None` if the channel isn't cached.
    #[instrument(skip(self), err)]
    pub async fn record_access(&mut self, channel_id: &str) -> Result<Option<DiscordChannelDBResponse>> {
        let channel = sqlx::query_as::<_, DiscordChannel>(
            r#"
            UPDATE discord_channels SET last_accessed = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            WHERE channel_id = ?
            RETURNING *
            "#,
        )
        .bind(channel_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(channel.map(Into::into))
    }
}
