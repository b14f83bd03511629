use axum::extract::State;
use chrono::Utc;

use crate::{
    AppState,
    api::extract::{Json, Query},
    api::models::{
        discord::{ChannelAccessQuery, DeeplinksQuery, DiscordChannelResponse, DiscordServerResponse},
        pagination::{DEFAULT_DEEPLINK_LIMIT, MAX_LIMIT},
        users::CurrentUser,
    },
    db::{
        handlers::{DiscordAccounts, DiscordChannels},
        models::discord::{DiscordAccountDBResponse, DiscordChannelUpsertDBRequest, DiscordServerUpsertDBRequest},
    },
    discord::{self, Channel, DiscordError, Guild, TEXT_CHANNEL_TYPE},
    errors::Error,
};

async fn linked_account(state: &AppState, user: &CurrentUser) -> Result<DiscordAccountDBResponse, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    DiscordAccounts::new(&mut conn)
        .get_by_user_id(user.id)
        .await?
        .ok_or_else(|| Error::bad_request("Discord account not linked"))
}

/// Return a usable access token, refreshing and persisting a new pair if the stored one has expired
async fn fresh_access_token(state: &AppState, account: DiscordAccountDBResponse) -> Result<String, Error> {
    if !account.token_expired(Utc::now()) {
        return Ok(account.access_token);
    }

    tracing::debug!("Discord token expired, refreshing");
    let refresh_failed = |e: DiscordError| Error::bad_request(format!("Failed to refresh Discord token: {e}"));
    let tokens = state
        .discord
        .refresh_token(&account.refresh_token)
        .await
        .map_err(refresh_failed)?;
    let expires_at = tokens.expires_at(Utc::now()).map_err(refresh_failed)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    DiscordAccounts::new(&mut conn)
        .update_tokens(
            account.user_id,
            &tokens.access_token,
            &tokens.refresh_token,
            expires_at,
        )
        .await?;

    Ok(tokens.access_token)
}

async fn fetch_guilds(state: &AppState, access_token: &str) -> Result<Vec<(Guild, Vec<Channel>)>, DiscordError> {
    let guilds = state.discord.get_user_guilds(access_token).await?;

    let mut result = Vec::with_capacity(guilds.len());
    for guild in guilds {
        let channels = state
            .discord
            .get_guild_channels(access_token, &guild.id)
            .await?
            .into_iter()
            .filter(|c| c.kind == TEXT_CHANNEL_TYPE)
            .collect();
        result.push((guild, channels));
    }
    Ok(result)
}

/// List the user's Discord servers and their text channels
#[utoipa::path(
    get,
    path = "/discord/servers",
    tag = "discord",
    responses(
        (status = 200, description = "Servers with text channels and deep links", body = [DiscordServerResponse]),
        (status = 400, description = "Discord account not linked, or Discord rejected the request"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_servers(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> Result<Json<Vec<DiscordServerResponse>>, Error> {
    let account = linked_account(&state, &current_user).await?;
    let access_token = fresh_access_token(&state, account).await?;

    let guilds = fetch_guilds(&state, &access_token)
        .await
        .map_err(|e| Error::bad_request(format!("Failed to get Discord servers: {e}")))?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut servers = Vec::with_capacity(guilds.len());
    {
        let mut cache = DiscordChannels::new(&mut tx);
        for (guild, channels) in guilds {
            cache
                .upsert_server(&DiscordServerUpsertDBRequest {
                    server_id: guild.id.clone(),
                    name: guild.name.clone(),
                    icon: guild.icon.clone(),
                })
                .await?;

            let mut cached = Vec::with_capacity(channels.len());
            for channel in channels {
                let row = cache
                    .upsert_channel(&DiscordChannelUpsertDBRequest {
                        deep_link: discord::create_deep_link(&guild.id, &channel.id),
                        channel_id: channel.id,
                        server_id: guild.id.clone(),
                        name: channel.name,
                        channel_type: channel.kind,
                        position: channel.position,
                    })
                    .await?;
                cached.push(DiscordChannelResponse::from(row));
            }

            servers.push(DiscordServerResponse {
                server_id: guild.id,
                name: guild.name,
                icon: guild.icon,
                channels: cached,
            });
        }
    }
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(servers))
}

/// Recently opened channels as deep links
#[utoipa::path(
    get,
    path = "/discord/deeplinks",
    tag = "discord",
    params(DeeplinksQuery),
    responses(
        (status = 200, description = "Channels, most recently accessed first", body = [DiscordChannelResponse]),
        (status = 400, description = "Discord account not linked"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_deeplinks(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<DeeplinksQuery>,
) -> Result<Json<Vec<DiscordChannelResponse>>, Error> {
    linked_account(&state, &current_user).await?;
    let limit = query.limit.unwrap_or(DEFAULT_DEEPLINK_LIMIT).clamp(1, MAX_LIMIT);

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let channels = DiscordChannels::new(&mut conn).list_recent(limit).await?;

    Ok(Json(channels.into_iter().map(DiscordChannelResponse::from).collect()))
}

/// Record that the user opened a channel
#[utoipa::path(
    post,
    path = "/discord/channel/access",
    tag = "discord",
    params(ChannelAccessQuery),
    responses(
        (status = 200, description = "Access recorded", body = DiscordChannelResponse),
        (status = 400, description = "Discord account not linked"),
        (status = 404, description = "Channel not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn record_channel_access(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ChannelAccessQuery>,
) -> Result<Json<DiscordChannelResponse>, Error> {
    linked_account(&state, &current_user).await?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let channel = DiscordChannels::new(&mut conn)
        .record_access(&query.channel_id)
        .await?
        .ok_or_else(|| Error::not_found("Channel", &query.channel_id))?;

    Ok(Json(channel.into()))
}

#[cfg(test)]
mod tests {
    use crate::api::models::discord::{DiscordChannelResponse, DiscordServerResponse};
    use crate::db::handlers::DiscordAccounts;
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use chrono::{Duration, Utc};
    use serde_json::json;
    use sqlx::SqlitePool;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_guilds(server: &MockServer, token: &str) {
        Mock::given(method("GET"))
            .and(path("/api/v10/users/@me/guilds"))
            .and(header("authorization", format!("Bearer {token}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "100", "name": "Raid Night", "icon": "abc"}
            ])))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v10/guilds/100/channels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "1", "type": 4, "name": "Text Channels", "position": 0},
                {"id": "2", "type": 0, "name": "general", "position": 1},
                {"id": "3", "type": 2, "name": "Voice", "position": 2},
                {"id": "4", "type": 0, "name": "lfg", "position": 3}
            ])))
            .mount(server)
            .await;
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_requires_linked_account(pool: SqlitePool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, false).await;
        let (name, value) = add_auth_headers(&user);

        for response in [
            app.get("/api/v1/discord/servers").add_header(name.clone(), value.clone()).await,
            app.get("/api/v1/discord/deeplinks").add_header(name.clone(), value.clone()).await,
            app.post("/api/v1/discord/channel/access?channel_id=1")
                .add_header(name.clone(), value.clone())
                .await,
        ] {
            response.assert_status(StatusCode::BAD_REQUEST);
            response.assert_json(&json!({"detail": "Discord account not linked"}));
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_servers_deeplinks_and_access(pool: SqlitePool) {
        let server = MockServer::start().await;
        mount_guilds(&server, "valid-access").await;

        let app = create_test_app_with_discord(pool.clone(), &server).await;
        let user = create_test_user(&pool, false).await;
        link_discord_account(&pool, user.id, "valid-access", Utc::now() + Duration::days(1)).await;
        let (name, value) = add_auth_headers(&user);

        let response = app.get("/api/v1/discord/servers").add_header(name.clone(), value.clone()).await;
        response.assert_status_ok();
        let servers: Vec<DiscordServerResponse> = response.json();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].name, "Raid Night");
        let channel_ids: Vec<&str> = servers[0].channels.iter().map(|c| c.channel_id.as_str()).collect();
        assert_eq!(channel_ids, vec!["2", "4"]);
        assert_eq!(servers[0].channels[1].deep_link, "discord://discord.com/channels/100/4");

        let response = app
            .post("/api/v1/discord/channel/access?channel_id=4")
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status_ok();
        let accessed: DiscordChannelResponse = response.json();
        assert!(accessed.last_accessed.is_some());

        let links: Vec<DiscordChannelResponse> = app
            .get("/api/v1/discord/deeplinks?limit=1")
            .add_header(name.clone(), value.clone())
            .await
            .json();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].channel_id, "4");

        // Listing again refreshes the cache without losing the access time
        app.get("/api/v1/discord/servers")
            .add_header(name.clone(), value.clone())
            .await
            .assert_status_ok();
        let links: Vec<DiscordChannelResponse> = app
            .get("/api/v1/discord/deeplinks")
            .add_header(name.clone(), value.clone())
            .await
            .json();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].channel_id, "4");
        assert!(links[0].last_accessed.is_some());

        let response = app
            .post("/api/v1/discord/channel/access?channel_id=999")
            .add_header(name, value)
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
        response.assert_json(&json!({"detail": "Channel not found"}));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_expired_token_is_refreshed(pool: SqlitePool) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v10/oauth2/token"))
            .and(body_string_contains("refresh_token=stored-refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "new-access",
                "refresh_token": "new-refresh",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;
        mount_guilds(&server, "new-access").await;

        let app = create_test_app_with_discord(pool.clone(), &server).await;
        let user = create_test_user(&pool, false).await;
        link_discord_account(&pool, user.id, "old-access", Utc::now() - Duration::minutes(1)).await;
        let (name, value) = add_auth_headers(&user);

        app.get("/api/v1/discord/servers")
            .add_header(name, value)
            .await
            .assert_status_ok();

        let mut conn = pool.acquire().await.unwrap();
        let account = DiscordAccounts::new(&mut conn).get_by_user_id(user.id).await.unwrap().unwrap();
        assert_eq!(account.access_token, "new-access");
        assert_eq!(account.refresh_token, "new-refresh");
        assert!(!account.token_expired(Utc::now()));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_discord_failures_surface_as_bad_request(pool: SqlitePool) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v10/oauth2/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v10/users/@me/guilds"))
            .respond_with(ResponseTemplate::new(401).set_body_string("401: Unauthorized"))
            .mount(&server)
            .await;

        let app = create_test_app_with_discord(pool.clone(), &server).await;

        let expired = create_test_user(&pool, false).await;
        link_discord_account(&pool, expired.id, "old", Utc::now() - Duration::minutes(1)).await;
        let (name, value) = add_auth_headers(&expired);
        let response = app.get("/api/v1/discord/servers").add_header(name, value).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({
            "detail": "Failed to refresh Discord token: Failed to refresh token: invalid_grant"
        }));

        let revoked = create_test_user(&pool, false).await;
        link_discord_account(&pool, revoked.id, "revoked", Utc::now() + Duration::days(1)).await;
        let (name, value) = add_auth_headers(&revoked);
        let response = app.get("/api/v1/discord/servers").add_header(name, value).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({
            "detail": "Failed to get Discord servers: Failed to get user guilds: 401: Unauthorized"
        }));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_refresh_with_out_of_range_lifetime(pool: SqlitePool) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v10/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "new-access",
                "refresh_token": "new-refresh",
                "expires_in": i64::MAX
            })))
            .expect(1)
            .mount(&server)
            .await;

        let app = create_test_app_with_discord(pool.clone(), &server).await;
        let user = create_test_user(&pool, false).await;
        link_discord_account(&pool, user.id, "old-access", Utc::now() - Duration::minutes(1)).await;
        let (name, value) = add_auth_headers(&user);

        let response = app.get("/api/v1/discord/servers").add_header(name, value).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({
            "detail": format!("Failed to refresh Discord token: token lifetime out of range: {}s", i64::MAX)
        }));

        // The stored pair is left untouched
        let mut conn = pool.acquire().await.unwrap();
        let account = DiscordAccounts::new(&mut conn).get_by_user_id(user.id).await.unwrap().unwrap();
        assert_eq!(account.access_token, "old-access");
    }
}
