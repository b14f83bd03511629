use axum::extract::State;

use crate::{
    AppState,
    api::extract::{Json, Path, Query},
    api::models::{
        games::{GameCreate, GameResponse, GameUpdate, ReportContextQuery, ReportContextResponse},
        pagination::{DEFAULT_GAME_LIMIT, Pagination},
        users::CurrentUser,
    },
    auth::current_user::RequireSuperuser,
    db::handlers::{Games, Repository, games::GameFilter},
    errors::Error,
    types::GameId,
};

/// List supported games
#[utoipa::path(
    get,
    path = "/games",
    tag = "games",
    params(Pagination),
    responses(
        (status = 200, description = "List of games", body = [GameResponse]),
        (status = 401, description = "Not authenticated"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_games(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<GameResponse>>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let games = Games::new(&mut conn)
        .list(&GameFilter::new(pagination.skip(), pagination.limit_or(DEFAULT_GAME_LIMIT)))
        .await?;

    Ok(Json(games.into_iter().map(GameResponse::from).collect()))
}

/// Add a game to the directory (superuser only)
#[utoipa::path(
    post,
    path = "/games",
    tag = "games",
    request_body = GameCreate,
    responses(
        (status = 200, description = "Game created", body = GameResponse),
        (status = 400, description = "Game with this package name already exists"),
        (status = 403, description = "Not enough permissions"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_game(
    State(state): State<AppState>,
    RequireSuperuser(_admin): RequireSuperuser,
    Json(create): Json<GameCreate>,
) -> Result<Json<GameResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Games::new(&mut conn);

    if repo.get_by_package_name(&create.package_name).await?.is_some() {
        return Err(Error::bad_request("Game with this package name already exists"));
    }

    let game = repo.create(&create.into()).await?;
    Ok(Json(game.into()))
}

/// Get a game by id
#[utoipa::path(
    get,
    path = "/games/{id}",
    tag = "games",
    params(("id" = uuid::Uuid, Path, description = "Game ID")),
    responses(
        (status = 200, description = "Game", body = GameResponse),
        (status = 404, description = "Game not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_game(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<GameId>,
) -> Result<Json<GameResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let game = Games::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Game", id))?;

    Ok(Json(game.into()))
}

/// Update a game (superuser only)
#[utoipa::path(
    put,
    path = "/games/{id}",
    tag = "games",
    request_body = GameUpdate,
    params(("id" = uuid::Uuid, Path, description = "Game ID")),
    responses(
        (status = 200, description = "Game updated", body = GameResponse),
        (status = 403, description = "Not enough permissions"),
        (status = 404, description = "Game not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_game(
    State(state): State<AppState>,
    RequireSuperuser(_admin): RequireSuperuser,
    Path(id): Path<GameId>,
    Json(update): Json<GameUpdate>,
) -> Result<Json<GameResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Games::new(&mut conn);

    if repo.get_by_id(id).await?.is_none() {
        return Err(Error::not_found("Game", id));
    }

    let game = repo.update(id, &update.into()).await?;
    Ok(Json(game.into()))
}

/// Look a game up by its Android package name
#[utoipa::path(
    get,
    path = "/games/package/{package_name}",
    tag = "games",
    params(("package_name" = String, Path, description = "Android package name")),
    responses(
        (status = 200, description = "Game", body = GameResponse),
        (status = 404, description = "Game not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_game_by_package(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(package_name): Path<String>,
) -> Result<Json<GameResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let game = Games::new(&mut conn)
        .get_by_package_name(&package_name)
        .await?
        .ok_or_else(|| Error::not_found("Game", &package_name))?;

    Ok(Json(game.into()))
}

/// Report the input context the keyboard was opened in.
///
/// Unknown packages are added to the directory as placeholder games.
#[utoipa::path(
    post,
    path = "/games/contexts",
    tag = "games",
    params(ReportContextQuery),
    responses(
        (status = 200, description = "Context recorded", body = ReportContextResponse),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn report_context(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<ReportContextQuery>,
) -> Result<Json<ReportContextResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let game = Games::new(&mut conn)
        .report_context(&query.package_name, &query.context)
        .await?;

    Ok(Json(ReportContextResponse {
        success: true,
        game_id: game.id,
    }))
}
