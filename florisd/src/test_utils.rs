//! Shared fixtures for unit and handler tests.

use crate::{
    AppState, Application,
    auth::{password, session},
    config::{Config, DiscordConfig},
    db::{
        handlers::{DiscordAccounts, Games, Repository, Templates, Users},
        models::{
            discord::DiscordAccountUpsertDBRequest,
            games::{GameCreateDBRequest, GameDBResponse},
            templates::{TemplateCreateDBRequest, TemplateDBResponse},
            users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
        },
    },
    discord::{DiscordApi, DiscordClient},
    types::{GameId, UserId},
};
use axum_test::TestServer;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::{Arc, LazyLock};
use url::Url;
use uuid::Uuid;
use wiremock::MockServer;

pub const TEST_PASSWORD: &str = "correct-horse-battery";

// Argon2 is slow on purpose; hash the shared password once per test binary
static TEST_PASSWORD_HASH: LazyLock<String> =
    LazyLock::new(|| password::hash_password(TEST_PASSWORD).expect("Failed to hash test password"));

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        discord: DiscordConfig {
            client_id: "test-client-id".to_string(),
            client_secret: "test-client-secret".to_string(),
            redirect_uri: "http://localhost:3000/auth/discord/callback".to_string(),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn discord_config_for(server: &MockServer) -> Config {
    let mut config = create_test_config();
    config.discord.api_base = Url::parse(&format!("{}/api/v10", server.uri())).expect("mock server URL is valid");
    config
}

pub fn create_test_state(pool: SqlitePool) -> AppState {
    let config = create_test_config();
    let discord = DiscordClient::new(&config.discord).expect("Failed to build Discord client");

    AppState::builder()
        .db(pool)
        .config(config)
        .discord(Arc::new(discord) as Arc<dyn DiscordApi>)
        .build()
}

pub async fn create_test_app(pool: SqlitePool) -> TestServer {
    Application::new_with_pool(create_test_config(), pool)
        .expect("Failed to create application")
        .into_test_server()
}

/// Test server whose Discord client talks to `server` instead of discord.com
pub async fn create_test_app_with_discord(pool: SqlitePool, server: &MockServer) -> TestServer {
    Application::new_with_pool(discord_config_for(server), pool)
        .expect("Failed to create application")
        .into_test_server()
}

pub async fn create_test_user(pool: &SqlitePool, is_superuser: bool) -> UserDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let email = format!("user-{}@example.com", Uuid::new_v4().simple());

    Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            email,
            hashed_password: TEST_PASSWORD_HASH.clone(),
            full_name: Some("Test Player".to_string()),
            is_active: true,
            is_superuser,
        })
        .await
        .expect("Failed to create test user")
}

pub async fn deactivate_user(pool: &SqlitePool, user_id: UserId) {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Users::new(&mut conn)
        .update(
            user_id,
            &UserUpdateDBRequest {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .expect("Failed to deactivate test user");
}

/// Header name and value carrying a valid bearer token for `user`
pub fn add_auth_headers(user: &UserDBResponse) -> (String, String) {
    let token = session::create_session_token(user.id, &create_test_config()).expect("Failed to create session token");
    ("authorization".to_string(), format!("Bearer {token}"))
}

pub async fn create_test_game(pool: &SqlitePool, package_name: &str) -> GameDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Games::new(&mut conn)
        .create(&GameCreateDBRequest {
            name: format!("Game {package_name}"),
            package_name: package_name.to_string(),
            icon_url: None,
            description: None,
            input_contexts: vec!["chat".to_string()],
        })
        .await
        .expect("Failed to create test game")
}

pub async fn create_test_template(
    pool: &SqlitePool,
    owner_id: UserId,
    game_id: Option<GameId>,
    is_public: bool,
) -> TemplateDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Templates::new(&mut conn)
        .create(&TemplateCreateDBRequest {
            title: format!("Template {}", Uuid::new_v4().simple()),
            content: "gg wp".to_string(),
            category: "chat".to_string(),
            game_id,
            owner_id,
            is_public,
            tags: vec!["greeting".to_string()],
        })
        .await
        .expect("Failed to create test template")
}

/// Link a Discord account with the given access token; the stored refresh token is always
/// `stored-refresh`
pub async fn link_discord_account(pool: &SqlitePool, user_id: UserId, access_token: &str, expires_at: DateTime<Utc>) {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    DiscordAccounts::new(&mut conn)
        .upsert(&DiscordAccountUpsertDBRequest {
            user_id,
            discord_id: Uuid::new_v4().simple().to_string(),
            username: "player".to_string(),
            discriminator: "0".to_string(),
            avatar: None,
            access_token: access_token.to_string(),
            refresh_token: "stored-refresh".to_string(),
            token_expires_at: expires_at,
        })
        .await
        .expect("Failed to link Discord account");
}
