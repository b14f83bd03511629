use std::collections::HashSet;

use axum::extract::State;
use sqlx::SqliteConnection;

use crate::{
    AppState,
    api::extract::{Json, Path, Query},
    api::models::{
        SuccessResponse,
        games::GameResponse,
        pagination::{DEFAULT_TEMPLATE_LIMIT, MAX_LIMIT},
        templates::{GameTemplatesQuery, ListTemplatesQuery, TemplateCreate, TemplateResponse, TemplateUpdate},
        users::CurrentUser,
    },
    db::{
        handlers::{Games, Repository, Templates, templates::TemplateFilter},
        models::templates::{TemplateCreateDBRequest, TemplateDBResponse},
    },
    errors::Error,
    types::{GameId, TemplateId},
};

/// Attach the linked game to each template, loading all of them in one query
async fn with_games(conn: &mut SqliteConnection, templates: Vec<TemplateDBResponse>) -> Result<Vec<TemplateResponse>, Error> {
    let game_ids: Vec<GameId> = templates
        .iter()
        .filter_map(|t| t.game_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let games = Games::new(conn).get_bulk(game_ids).await?;

    Ok(templates
        .into_iter()
        .map(|template| {
            let game = template.game_id.and_then(|id| games.get(&id).cloned()).map(GameResponse::from);
            TemplateResponse::from(template).with_game(game)
        })
        .collect())
}

async fn with_game(conn: &mut SqliteConnection, template: TemplateDBResponse) -> Result<TemplateResponse, Error> {
    let mut responses = with_games(conn, vec![template]).await?;
    responses.pop().ok_or_else(|| Error::Internal {
        operation: "attach game to template".to_string(),
    })
}

/// Load a template the caller may read: their own, or anyone's public one
async fn readable_template(conn: &mut SqliteConnection, id: TemplateId, user: &CurrentUser) -> Result<TemplateDBResponse, Error> {
    let template = Templates::new(conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Template", id))?;

    if template.owner_id != user.id && !template.is_public {
        return Err(Error::forbidden("Not enough permissions"));
    }
    Ok(template)
}

/// Load a template the caller owns
async fn owned_template(conn: &mut SqliteConnection, id: TemplateId, user: &CurrentUser) -> Result<TemplateDBResponse, Error> {
    let template = Templates::new(conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Template", id))?;

    if template.owner_id != user.id {
        return Err(Error::forbidden("Not enough permissions"));
    }
    Ok(template)
}

/// List the current user's templates
#[utoipa::path(
    get,
    path = "/templates",
    tag = "templates",
    params(ListTemplatesQuery),
    responses(
        (status = 200, description = "The caller's templates, most recently updated first", body = [TemplateResponse]),
        (status = 401, description = "Not authenticated"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_templates(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListTemplatesQuery>,
) -> Result<Json<Vec<TemplateResponse>>, Error> {
    let filter = TemplateFilter::owned_by(
        current_user.id,
        query.pagination.skip(),
        query.pagination.limit_or(DEFAULT_TEMPLATE_LIMIT),
    )
    .with_game(query.game)
    .with_category(query.category);

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let templates = Templates::new(&mut conn).list(&filter).await?;

    Ok(Json(with_games(&mut conn, templates).await?))
}

/// List public templates from all users
#[utoipa::path(
    get,
    path = "/templates/public",
    tag = "templates",
    params(ListTemplatesQuery),
    responses(
        (status = 200, description = "Public templates, most used first", body = [TemplateResponse]),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_public_templates(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<ListTemplatesQuery>,
) -> Result<Json<Vec<TemplateResponse>>, Error> {
    let filter = TemplateFilter::public(query.pagination.skip(), query.pagination.limit_or(DEFAULT_TEMPLATE_LIMIT))
        .with_game(query.game)
        .with_category(query.category);

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let templates = Templates::new(&mut conn).list(&filter).await?;

    Ok(Json(with_games(&mut conn, templates).await?))
}

/// Create a template owned by the current user
#[utoipa::path(
    post,
    path = "/templates",
    tag = "templates",
    request_body = TemplateCreate,
    responses(
        (status = 200, description = "Template created", body = TemplateResponse),
        (status = 404, description = "Game not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_template(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(create): Json<TemplateCreate>,
) -> Result<Json<TemplateResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    if let Some(game_id) = create.game_id
        && Games::new(&mut conn).get_by_id(game_id).await?.is_none()
    {
        return Err(Error::not_found("Game", game_id));
    }

    let template = Templates::new(&mut conn)
        .create(&TemplateCreateDBRequest {
            title: create.title,
            content: create.content,
            category: create.category,
            game_id: create.game_id,
            owner_id: current_user.id,
            is_public: create.is_public,
            tags: create.tags,
        })
        .await?;

    Ok(Json(with_game(&mut conn, template).await?))
}

/// Get a template
#[utoipa::path(
    get,
    path = "/templates/{id}",
    tag = "templates",
    params(("id" = uuid::Uuid, Path, description = "Template ID")),
    responses(
        (status = 200, description = "Template", body = TemplateResponse),
        (status = 403, description = "Template is private and owned by someone else"),
        (status = 404, description = "Template not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_template(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<TemplateId>,
) -> Result<Json<TemplateResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let template = readable_template(&mut conn, id, &current_user).await?;

    Ok(Json(with_game(&mut conn, template).await?))
}

/// Update a template the current user owns
#[utoipa::path(
    put,
    path = "/templates/{id}",
    tag = "templates",
    request_body = TemplateUpdate,
    params(("id" = uuid::Uuid, Path, description = "Template ID")),
    responses(
        (status = 200, description = "Template updated", body = TemplateResponse),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Template not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_template(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<TemplateId>,
    Json(update): Json<TemplateUpdate>,
) -> Result<Json<TemplateResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    owned_template(&mut conn, id, &current_user).await?;

    let template = Templates::new(&mut conn).update(id, &update.into()).await?;
    Ok(Json(with_game(&mut conn, template).await?))
}

/// Delete a template the current user owns
#[utoipa::path(
    delete,
    path = "/templates/{id}",
    tag = "templates",
    params(("id" = uuid::Uuid, Path, description = "Template ID")),
    responses(
        (status = 200, description = "Template deleted", body = SuccessResponse),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Template not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_template(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<TemplateId>,
) -> Result<Json<SuccessResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    owned_template(&mut conn, id, &current_user).await?;

    // Gone if another request deleted it after the ownership check
    if !Templates::new(&mut conn).delete(id).await? {
        return Err(Error::not_found("Template", id));
    }
    Ok(Json(SuccessResponse::ok()))
}

/// Record that a template was inserted from the keyboard
#[utoipa::path(
    post,
    path = "/templates/{id}/use",
    tag = "templates",
    params(("id" = uuid::Uuid, Path, description = "Template ID")),
    responses(
        (status = 200, description = "Usage recorded", body = TemplateResponse),
        (status = 403, description = "Template is private and owned by someone else"),
        (status = 404, description = "Template not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn use_template(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<TemplateId>,
) -> Result<Json<TemplateResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    readable_template(&mut conn, id, &current_user).await?;

    // Deleted between the visibility check and the increment
    let template = Templates::new(&mut conn)
        .increment_usage(id)
        .await?
        .ok_or_else(|| Error::not_found("Template", id))?;

    Ok(Json(with_game(&mut conn, template).await?))
}

/// Templates to offer inside a game: the caller's own first, then popular public ones
#[utoipa::path(
    get,
    path = "/templates/game/{package_name}",
    tag = "templates",
    params(
        ("package_name" = String, Path, description = "Android package name"),
        GameTemplatesQuery,
    ),
    responses(
        (status = 200, description = "Templates for the game; empty when the package is unknown", body = [TemplateResponse]),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_templates_for_game(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(package_name): Path<String>,
    Query(query): Query<GameTemplatesQuery>,
) -> Result<Json<Vec<TemplateResponse>>, Error> {
    let limit = query.limit.unwrap_or(DEFAULT_TEMPLATE_LIMIT).clamp(1, MAX_LIMIT);

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let Some(game) = Games::new(&mut conn).get_by_package_name(&package_name).await? else {
        return Ok(Json(vec![]));
    };

    let templates = Templates::new(&mut conn)
        .list_for_game(game.id, Some(current_user.id), 0, limit)
        .await?;

    let game = GameResponse::from(game);
    Ok(Json(
        templates
            .into_iter()
            .map(|t| TemplateResponse::from(t).with_game(Some(game.clone())))
            .collect(),
    ))
}
