//! # florisd: backend for the FlorisBoard keyboard enhancements
//!
//! `florisd` serves the HTTP API that the enhanced FlorisBoard keyboard talks to. It lets a
//! user keep a library of quick-text templates, suggests templates while a particular game is
//! in the foreground, maintains a directory of known games and the input fields (contexts)
//! seen inside them, and links a Discord account so the keyboard can jump straight into a
//! channel via deep links.
//!
//! ## Architecture
//!
//! The HTTP layer is [Axum](https://github.com/tokio-rs/axum); persistence is SQLite through
//! `sqlx`. Every request is handled independently. The only state shared between requests is
//! the connection pool, the immutable [`Config`], and the Discord HTTP client.
//!
//! - The **API layer** ([`api`]) holds handlers and request/response models. All routes live
//!   under the configured `api_prefix` (default `/api/v1`).
//! - The **authentication layer** ([`auth`]) issues and verifies bearer JWTs and hashes
//!   passwords with Argon2id.
//! - The **database layer** ([`db`]) exposes one repository per entity.
//! - The **Discord integration** ([`discord`]) wraps the OAuth2 and REST endpoints behind the
//!   [`discord::DiscordApi`] trait.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use florisd::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = florisd::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     florisd::telemetry::init_telemetry(config.log_format, config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod discord;
pub mod errors;
mod openapi;
pub mod telemetry;
pub mod types;

#[cfg(test)]
mod test_utils;

use crate::{
    auth::password,
    config::CorsOrigin,
    db::{
        handlers::{Repository, Users},
        models::users::{UserCreateDBRequest, UserUpdateDBRequest},
    },
    discord::{DiscordApi, DiscordClient},
};
use axum::{
    Json, Router,
    http::{self, HeaderValue},
    routing::{get, post},
};
use bon::Builder;
pub use config::Config;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use std::{str::FromStr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa_scalar::{Scalar, Servable};

pub use types::{GameId, TemplateId, UserId};

/// Application state shared across all request handlers.
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .discord(Arc::new(DiscordClient::new(&config.discord)?))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
    /// Outbound Discord calls; swapped for a client pointed at a mock server in tests
    pub discord: Arc<dyn DiscordApi>,
}

/// Get the florisd database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Open the SQLite pool, creating the database file if it does not exist yet
pub async fn connect_database(config: &config::DatabaseConfig) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Create the configured superuser, or reset its password and privileges if it already exists.
///
/// Returns the user's id. Safe to call on every start.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(email: &str, password: &str, db: &SqlitePool) -> anyhow::Result<UserId> {
    let password = password.to_string();
    let hashed_password = tokio::task::spawn_blocking(move || password::hash_password(&password))
        .await?
        .map_err(|e| anyhow::anyhow!("Failed to hash admin password: {e}"))?;

    let mut tx = db.begin().await?;
    let mut user_repo = Users::new(&mut tx);

    let user_id = if let Some(existing) = user_repo.get_user_by_email(email).await? {
        user_repo
            .update(
                existing.id,
                &UserUpdateDBRequest {
                    hashed_password: Some(hashed_password),
                    is_active: Some(true),
                    is_superuser: Some(true),
                    ..Default::default()
                },
            )
            .await?;
        existing.id
    } else {
        user_repo
            .create(&UserCreateDBRequest {
                email: email.to_string(),
                hashed_password,
                full_name: None,
                is_active: true,
                is_superuser: true,
            })
            .await?
            .id
    };

    tx.commit().await?;
    Ok(user_id)
}

async fn setup_database(config: &Config) -> anyhow::Result<SqlitePool> {
    let pool = connect_database(&config.database).await?;
    migrator().run(&pool).await?;

    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        let user_id = create_initial_admin_user(email, password, &pool).await?;
        info!("Initial admin user ready ({})", types::abbrev_uuid(&user_id));
    }

    Ok(pool)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.cors;

    let allow_origin = if cors_config.allowed_origins.contains(&CorsOrigin::Wildcard) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &cors_config.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                origins.push(url.origin().ascii_serialization().parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(cors_config.allow_credentials)
        .expose_headers(vec![http::header::WWW_AUTHENTICATE]);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router: the API under `api_prefix`, the service endpoints, the
/// OpenAPI document and its UI, plus CORS and request tracing.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    use api::handlers::{auth, discord, games, root, templates};

    let api_routes = Router::new()
        // Auth
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
        .route("/auth/me", get(auth::me))
        .route("/auth/discord/authorize", get(auth::discord_authorize).post(auth::discord_authorize))
        .route("/auth/discord/callback", get(auth::discord_callback))
        // Games
        .route("/games", get(games::list_games).post(games::create_game))
        .route("/games/contexts", post(games::report_context))
        .route("/games/package/{package_name}", get(games::get_game_by_package))
        .route("/games/{id}", get(games::get_game).put(games::update_game))
        // Templates
        .route("/templates", get(templates::list_templates).post(templates::create_template))
        .route("/templates/public", get(templates::list_public_templates))
        .route("/templates/game/{package_name}", get(templates::list_templates_for_game))
        .route(
            "/templates/{id}",
            get(templates::get_template)
                .put(templates::update_template)
                .delete(templates::delete_template),
        )
        .route("/templates/{id}/use", post(templates::use_template))
        // Discord
        .route("/discord/servers", get(discord::list_servers))
        .route("/discord/deeplinks", get(discord::list_deeplinks))
        .route("/discord/channel/access", post(discord::record_channel_access))
        .with_state(state.clone());

    let openapi = openapi::openapi(&state.config.api_prefix);

    let router = Router::new()
        .route("/", get(root::root))
        .route("/health", get(root::health))
        .route(
            "/openapi.json",
            get(move || {
                let doc = openapi.clone();
                async move { Json(doc) }
            }),
        )
        .merge(Scalar::with_url("/docs", openapi::openapi(&state.config.api_prefix)))
        .nest(&state.config.api_prefix, api_routes)
        .layer(create_cors_layer(&state.config)?)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(tower_http::LatencyUnit::Millis),
                ),
        );

    Ok(router)
}

/// Main application: owns the router and the database pool.
///
/// 1. **Create**: [`Application::new`] connects to the database, runs migrations, bootstraps
///    the admin user, and builds the router
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and handles requests until the
///    shutdown future resolves, then closes the pool and flushes telemetry
pub struct Application {
    router: Router,
    config: Config,
    pool: SqlitePool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!(
            "Starting florisd: bind={}, api_prefix={}, database={}",
            config.bind_address(),
            config.api_prefix,
            config.database.url
        );

        let pool = setup_database(&config).await?;
        Self::new_with_pool(config, pool)
    }

    /// Build the application around an existing, migrated pool
    pub fn new_with_pool(config: Config, pool: SqlitePool) -> anyhow::Result<Self> {
        let discord_client = DiscordClient::new(&config.discord)?;

        let app_state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .discord(Arc::new(discord_client) as Arc<dyn DiscordApi>)
            .build();

        let router = build_router(app_state)?;

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "florisd listening on http://{}, API under {}",
            bind_addr, self.config.api_prefix
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
