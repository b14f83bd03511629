use axum::extract::State;
use lettre::Address;

use crate::{
    AppState,
    api::extract::{Form, Json, Query},
    api::models::{
        auth::{AuthorizeUrlResponse, DiscordCallbackQuery, LoginForm, TokenResponse},
        discord::DiscordAccountResponse,
        users::{CurrentUser, UserCreate, UserResponse},
    },
    auth::{password, session},
    db::{
        handlers::{DiscordAccounts, Repository, Users},
        models::{discord::DiscordAccountUpsertDBRequest, users::UserCreateDBRequest},
    },
    discord,
    errors::Error,
};

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    tag = "auth",
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 400, description = "Inactive user"),
        (status = 401, description = "Incorrect email or password"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Result<Json<TokenResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn).get_user_by_email(&form.username).await?;

    // Verify even when the user is missing so response timing does not reveal which emails exist
    let stored_hash = user.as_ref().map(|u| u.hashed_password.clone());
    let is_valid = tokio::task::spawn_blocking(move || match stored_hash {
        Some(hash) => password::verify_password(&form.password, &hash),
        None => password::hash_password(&form.password).map(|_| false),
    })
    .await
    .map_err(|e| Error::Internal {
        operation: format!("spawn password verification task: {e}"),
    })??;

    let user = match user {
        Some(user) if is_valid => user,
        _ => return Err(Error::unauthenticated("Incorrect email or password")),
    };

    if !user.is_active {
        return Err(Error::bad_request("Inactive user"));
    }

    let token = session::create_session_token(user.id, &state.config)?;
    Ok(Json(TokenResponse::bearer(token)))
}

/// Register a new user account
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = UserCreate,
    tag = "auth",
    responses(
        (status = 200, description = "User registered successfully", body = UserResponse),
        (status = 400, description = "Invalid email address, or email already registered"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register(State(state): State<AppState>, Json(request): Json<UserCreate>) -> Result<Json<UserResponse>, Error> {
    let email = request
        .email
        .parse::<Address>()
        .map_err(|_| Error::bad_request("Invalid email address"))?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut user_repo = Users::new(&mut conn);

    if user_repo.get_user_by_email(email.as_ref()).await?.is_some() {
        return Err(Error::bad_request("Email already registered"));
    }

    let password = request.password.clone();
    let hashed_password = tokio::task::spawn_blocking(move || password::hash_password(&password))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })??;

    let created = user_repo
        .create(&UserCreateDBRequest {
            email: email.to_string(),
            hashed_password,
            full_name: request.full_name,
            is_active: request.is_active,
            is_superuser: false,
        })
        .await?;

    Ok(Json(created.into()))
}

/// Get the current user
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not authenticated"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn me(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<UserResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let account = DiscordAccounts::new(&mut conn).get_by_user_id(current_user.id).await?;

    let response = UserResponse::from(current_user).with_discord_account(account.map(DiscordAccountResponse::from));
    Ok(Json(response))
}

/// Get the Discord page that asks the user to grant access
#[utoipa::path(
    get,
    path = "/auth/discord/authorize",
    tag = "auth",
    responses(
        (status = 200, description = "Authorization URL", body = AuthorizeUrlResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn discord_authorize(State(state): State<AppState>) -> Result<Json<AuthorizeUrlResponse>, Error> {
    let url = discord::authorize_url(&state.config.discord).map_err(|e| Error::Internal {
        operation: format!("build Discord authorize URL: {e}"),
    })?;

    Ok(Json(AuthorizeUrlResponse {
        authorize_url: url.to_string(),
    }))
}

/// Complete Discord linking for the current user
#[utoipa::path(
    get,
    path = "/auth/discord/callback",
    params(DiscordCallbackQuery),
    tag = "auth",
    responses(
        (status = 200, description = "Discord account linked", body = TokenResponse),
        (status = 400, description = "Failed to authenticate with Discord"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn discord_callback(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<DiscordCallbackQuery>,
) -> Result<Json<TokenResponse>, Error> {
    let link_failed = |e: discord::DiscordError| Error::bad_request(format!("Failed to authenticate with Discord: {e}"));

    let tokens = state.discord.exchange_code(&query.code).await.map_err(link_failed)?;
    let token_expires_at = tokens.expires_at(chrono::Utc::now()).map_err(link_failed)?;
    let discord_user = state.discord.get_user_info(&tokens.access_token).await.map_err(link_failed)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let account = DiscordAccounts::new(&mut conn)
        .upsert(&DiscordAccountUpsertDBRequest {
            user_id: current_user.id,
            discord_id: discord_user.id,
            username: discord_user.username,
            discriminator: discord_user.discriminator,
            avatar: discord_user.avatar,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_expires_at,
        })
        .await?;
    tracing::info!("Linked Discord account {} to user {}", account.discord_id, current_user.id);

    let token = session::create_session_token(current_user.id, &state.config)?;
    Ok(Json(TokenResponse::bearer(token)))
}

#[cfg(test)]
mod tests {
    use crate::api::models::{auth::TokenResponse, users::UserResponse};
    use crate::auth::session;
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::SqlitePool;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[sqlx::test]
    #[test_log::test]
    async fn test_register_then_login(pool: SqlitePool) {
        let app = create_test_app(pool.clone()).await;

        let response = app
            .post("/api/v1/auth/register")
            .json(&json!({
                "email": "player@example.com",
                "password": "hunter2hunter2",
                "full_name": "Player One"
            }))
            .await;
        response.assert_status_ok();
        let user: UserResponse = response.json();
        assert_eq!(user.email, "player@example.com");
        assert!(user.is_active);
        assert!(!user.is_superuser);
        assert!(user.discord_account.is_none());

        let response = app
            .post("/api/v1/auth/register")
            .json(&json!({"email": "player@example.com", "password": "another"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({"detail": "Email already registered"}));

        let response = app
            .post("/api/v1/auth/login")
            .form(&[("username", "player@example.com"), ("password", "hunter2hunter2")])
            .await;
        response.assert_status_ok();
        let token: TokenResponse = response.json();
        assert_eq!(token.token_type, "bearer");
        let subject = session::verify_session_token(&token.access_token, &create_test_config()).unwrap();
        assert_eq!(subject, user.id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_login_failures(pool: SqlitePool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, false).await;

        let response = app
            .post("/api/v1/auth/login")
            .form(&[("username", user.email.as_str()), ("password", "wrong")])
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        response.assert_json(&json!({"detail": "Incorrect email or password"}));
        assert_eq!(response.header("www-authenticate"), "Bearer");

        let response = app
            .post("/api/v1/auth/login")
            .form(&[("username", "nobody@example.com"), ("password", TEST_PASSWORD)])
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);

        deactivate_user(&pool, user.id).await;
        let response = app
            .post("/api/v1/auth/login")
            .form(&[("username", user.email.as_str()), ("password", TEST_PASSWORD)])
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({"detail": "Inactive user"}));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_me(pool: SqlitePool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, false).await;

        let response = app.get("/api/v1/auth/me").await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        response.assert_json(&json!({"detail": "Not authenticated"}));

        let (name, value) = add_auth_headers(&user);
        let response = app.get("/api/v1/auth/me").add_header(name, value).await;
        response.assert_status_ok();
        let me: UserResponse = response.json();
        assert_eq!(me.id, user.id);
        assert!(me.discord_account.is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_discord_authorize(pool: SqlitePool) {
        let app = create_test_app(pool).await;

        let response = app.get("/api/v1/auth/discord/authorize").await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        let url = body["authorize_url"].as_str().unwrap();
        assert!(url.starts_with("https://discord.com/api/v10/oauth2/authorize?client_id="));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("scope=identify+guilds"));

        app.post("/api/v1/auth/discord/authorize").await.assert_status_ok();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_discord_callback_links_account(pool: SqlitePool) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v10/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "discord-access",
                "refresh_token": "discord-refresh",
                "expires_in": 604800
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v10/users/@me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "80351110224678912",
                "username": "nelly",
                "discriminator": "1337",
                "avatar": "8342729096ea3675442027381ff50dfe"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let app = create_test_app_with_discord(pool.clone(), &server).await;
        let user = create_test_user(&pool, false).await;
        let (name, value) = add_auth_headers(&user);

        let response = app
            .get("/api/v1/auth/discord/callback?code=abc")
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status_ok();
        let token: TokenResponse = response.json();
        assert_eq!(token.token_type, "bearer");

        let me: UserResponse = app.get("/api/v1/auth/me").add_header(name, value).await.json();
        let account = me.discord_account.unwrap();
        assert_eq!(account.discord_id, "80351110224678912");
        assert_eq!(account.username, "nelly");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_discord_callback_failure(pool: SqlitePool) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v10/oauth2/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let app = create_test_app_with_discord(pool.clone(), &server).await;
        let user = create_test_user(&pool, false).await;
        let (name, value) = add_auth_headers(&user);

        let response = app.get("/api/v1/auth/discord/callback?code=bad").add_header(name, value).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({
            "detail": "Failed to authenticate with Discord: Failed to exchange code: invalid_grant"
        }));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_discord_callback_rejects_out_of_range_lifetime(pool: SqlitePool) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v10/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "discord-access",
                "refresh_token": "discord-refresh",
                "expires_in": -9_223_372_036_854_775_807i64
            })))
            .mount(&server)
            .await;

        let app = create_test_app_with_discord(pool.clone(), &server).await;
        let user = create_test_user(&pool, false).await;
        let (name, value) = add_auth_headers(&user);

        let response = app
            .get("/api/v1/auth/discord/callback?code=abc")
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({
            "detail": "Failed to authenticate with Discord: token lifetime out of range: -9223372036854775807s"
        }));

        let me: UserResponse = app.get("/api/v1/auth/me").add_header(name, value).await.json();
        assert!(me.discord_account.is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_register_rejects_invalid_email(pool: SqlitePool) {
        let app = create_test_app(pool).await;

        for email in ["definitely not an email", "", "player@", "@example.com"] {
            let response = app
                .post("/api/v1/auth/register")
                .json(&json!({"email": email, "password": "hunter2hunter2"}))
                .await;
            response.assert_status(StatusCode::BAD_REQUEST);
            response.assert_json(&json!({"detail": "Invalid email address"}));
        }

        app.post("/api/v1/auth/register")
            .json(&json!({"email": "player.one+keyboard@example.com", "password": "hunter2hunter2"}))
            .await
            .assert_status_ok();
    }
}
