//! OpenAPI documentation.
//!
//! [`ApiDoc`] covers every route under the API prefix; [`ServiceApiDoc`] covers the unprefixed
//! service endpoints. [`openapi`] nests the former under the configured prefix.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::api;

/// Bearer JWT issued by `/auth/login`
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Session token from `POST /auth/login`:\n\n```\nAuthorization: Bearer YOUR_TOKEN\n```",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "FlorisBoard Enhancement API",
        description = "Templates, game directory and Discord deep links for the FlorisBoard keyboard"
    ),
    modifiers(&SecurityAddon),
    paths(
        api::handlers::auth::login,
        api::handlers::auth::register,
        api::handlers::auth::me,
        api::handlers::auth::discord_authorize,
        api::handlers::auth::discord_callback,
        api::handlers::games::list_games,
        api::handlers::games::create_game,
        api::handlers::games::get_game,
        api::handlers::games::update_game,
        api::handlers::games::get_game_by_package,
        api::handlers::games::report_context,
        api::handlers::templates::list_templates,
        api::handlers::templates::list_public_templates,
        api::handlers::templates::create_template,
        api::handlers::templates::get_template,
        api::handlers::templates::update_template,
        api::handlers::templates::delete_template,
        api::handlers::templates::use_template,
        api::handlers::templates::list_templates_for_game,
        api::handlers::discord::list_servers,
        api::handlers::discord::list_deeplinks,
        api::handlers::discord::record_channel_access,
    ),
    components(schemas(
        api::models::SuccessResponse,
        api::models::auth::LoginForm,
        api::models::auth::TokenResponse,
        api::models::auth::AuthorizeUrlResponse,
        api::models::users::UserCreate,
        api::models::users::UserResponse,
        api::models::games::GameCreate,
        api::models::games::GameUpdate,
        api::models::games::GameResponse,
        api::models::games::ReportContextResponse,
        api::models::templates::TemplateCreate,
        api::models::templates::TemplateUpdate,
        api::models::templates::TemplateResponse,
        api::models::discord::DiscordAccountResponse,
        api::models::discord::DiscordServerResponse,
        api::models::discord::DiscordChannelResponse,
    )),
    tags(
        (name = "auth", description = "Login, registration and Discord account linking"),
        (name = "games", description = "Game directory and input-context reports"),
        (name = "templates", description = "Quick-text templates"),
        (name = "discord", description = "Discord servers and channel deep links"),
    )
)]
pub struct ApiDoc;

#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    paths(api::handlers::root::root, api::handlers::root::health),
    components(schemas(api::handlers::root::WelcomeResponse, api::handlers::root::HealthResponse)),
    tags((name = "service", description = "Welcome and health endpoints"))
)]
pub struct ServiceApiDoc;

/// The full document, with API routes under `api_prefix`
pub fn openapi(api_prefix: &str) -> utoipa::openapi::OpenApi {
    ServiceApiDoc::openapi().nest(api_prefix, ApiDoc::openapi())
}
