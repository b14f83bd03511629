//! Database repository for the game directory.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::games::{GameCreateDBRequest, GameDBResponse, GameUpdateDBRequest},
};
use crate::types::{GameId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{Connection, FromRow, QueryBuilder, Sqlite, SqliteConnection};
use std::collections::HashMap;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Filter for listing games
#[derive(Debug, Clone)]
pub struct GameFilter {
    pub skip: i64,
    pub limit: i64,
}

impl GameFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }
}

#[derive(Debug, Clone, FromRow)]
struct Game {
    pub id: GameId,
    pub name: String,
    pub package_name: String,
    pub icon_url: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct InputContext {
    game_id: GameId,
    context: String,
}

impl From<(Game, Vec<String>)> for GameDBResponse {
    fn from((game, input_contexts): (Game, Vec<String>)) -> Self {
        Self {
            id: game.id,
            name: game.name,
            package_name: game.package_name,
            icon_url: game.icon_url,
            description: game.description,
            input_contexts,
            created_at: game.created_at,
            updated_at: game.updated_at,
        }
    }
}

/// Name given to a game first seen through a context report
pub fn unknown_game_name(package_name: &str) -> String {
    format!("Unknown Game ({package_name})")
}

pub struct Games<'c> {
    db: &'c mut SqliteConnection,
}

/// Insert contexts for a game, skipping ones it already has. Returns how many were added.
async fn insert_contexts(conn: &mut SqliteConnection, game_id: GameId, contexts: &[String]) -> Result<u64> {
    let mut added = 0;
    for context in contexts {
        let result = sqlx::query("INSERT OR IGNORE INTO game_input_contexts (game_id, context) VALUES (?, ?)")
            .bind(game_id)
            .bind(context)
            .execute(&mut *conn)
            .await?;
        added += result.rows_affected();
    }
    Ok(added)
}

async fn contexts_for(conn: &mut SqliteConnection, ids: &[GameId]) -> Result<HashMap<GameId, Vec<String>>> {
    let mut by_game: HashMap<GameId, Vec<String>> = HashMap::new();
    if ids.is_empty() {
        return Ok(by_game);
    }

    let mut query = QueryBuilder::<Sqlite>::new("SELECT game_id, context FROM game_input_contexts WHERE game_id IN (");
    let mut separated = query.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(") ORDER BY rowid");

    for row in query.build_query_as::<InputContext>().fetch_all(&mut *conn).await? {
        by_game.entry(row.game_id).or_default().push(row.context);
    }
    Ok(by_game)
}

async fn with_contexts(conn: &mut SqliteConnection, games: Vec<Game>) -> Result<Vec<GameDBResponse>> {
    let ids: Vec<GameId> = games.iter().map(|g| g.id).collect();
    let mut contexts = contexts_for(conn, &ids).await?;

    Ok(games
        .into_iter()
        .map(|game| {
            let input_contexts = contexts.remove(&game.id).unwrap_or_default();
            GameDBResponse::from((game, input_contexts))
        })
        .collect())
}

#[async_trait::async_trait]
impl<'c> Repository for Games<'c> {
    type CreateRequest = GameCreateDBRequest;
    type UpdateRequest = GameUpdateDBRequest;
    type Response = GameDBResponse;
    type Id = GameId;
    type Filter = GameFilter;

    #[instrument(skip(self, request), fields(package_name = %request.package_name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let mut tx = self.db.begin().await?;

        let game = sqlx::query_as::<_, Game>(
            r#"
            INSERT INTO games (id, name, package_name, icon_url, description)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.name)
        .bind(&request.package_name)
        .bind(&request.icon_url)
        .bind(&request.description)
        .fetch_one(&mut *tx)
        .await?;

        insert_contexts(&mut tx, game.id, &request.input_contexts).await?;
        let input_contexts = contexts_for(&mut tx, &[game.id]).await?.remove(&game.id).unwrap_or_default();

        tx.commit().await?;

        Ok(GameDBResponse::from((game, input_contexts)))
    }

    #[instrument(skip(self), fields(game_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let game = sqlx::query_as::<_, Game>("SELECT * FROM games WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        match game {
            Some(game) => Ok(with_contexts(&mut *self.db, vec![game]).await?.pop()),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<GameId>) -> Result<HashMap<Self::Id, GameDBResponse>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM games WHERE id IN (");
        let mut separated = query.separated(", ");
        for id in &ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let games = query.build_query_as::<Game>().fetch_all(&mut *self.db).await?;

        Ok(with_contexts(&mut *self.db, games).await?.into_iter().map(|g| (g.id, g)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let games = sqlx::query_as::<_, Game>("SELECT * FROM games ORDER BY created_at, rowid LIMIT ? OFFSET ?")
            .bind(filter.limit)
            .bind(filter.skip)
            .fetch_all(&mut *self.db)
            .await?;

        with_contexts(&mut *self.db, games).await
    }

    #[instrument(skip(self), fields(game_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM games WHERE id = ?").bind(id).execute(&mut *self.db).await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(game_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let mut tx = self.db.begin().await?;

        let game = sqlx::query_as::<_, Game>(
            r#"
            UPDATE games SET
                name = COALESCE(?, name),
                icon_url = COALESCE(?, icon_url),
                description = COALESCE(?, description),
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&request.name)
        .bind(&request.icon_url)
        .bind(&request.description)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DbError::NotFound)?;

        if let Some(contexts) = &request.input_contexts {
            sqlx::query("DELETE FROM game_input_contexts WHERE game_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_contexts(&mut tx, id, contexts).await?;
        }

        let input_contexts = contexts_for(&mut tx, &[id]).await?.remove(&id).unwrap_or_default();
        tx.commit().await?;

        Ok(GameDBResponse::from((game, input_contexts)))
    }
}

impl<'c> Games<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_package_name(&mut self, package_name: &str) -> Result<Option<GameDBResponse>> {
        let game = sqlx::query_as::<_, Game>("SELECT * FROM games WHERE package_name = ?")
            .bind(package_name)
            .fetch_optional(&mut *self.db)
            .await?;

        match game {
            Some(game) => Ok(with_contexts(&mut *self.db, vec![game]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Record that `context` was seen in the app identified by `package_name`.
    ///
    /// Unknown packages get a placeholder game holding just this context. Known games get
    /// the context appended unless an identical one is already present. Each write is a
    /// single statement, so concurrent reports cannot drop each other's contexts.
    #[instrument(skip(self), err)]
    pub async fn report_context(&mut self, package_name: &str, context: &str) -> Result<GameDBResponse> {
        if let Some(game) = self.get_by_package_name(package_name).await? {
            if insert_contexts(&mut *self.db, game.id, &[context.to_string()]).await? > 0 {
                debug!("Appended new input context to {}", package_name);
                return self.get_by_id(game.id).await?.ok_or(DbError::NotFound);
            }
            return Ok(game);
        }

        let request = GameCreateDBRequest {
            name: unknown_game_name(package_name),
            package_name: package_name.to_string(),
            icon_url: None,
            description: None,
            input_contexts: vec![context.to_string()],
        };

        match self.create(&request).await {
            Ok(game) => Ok(game),
            // Another report created it first
            Err(DbError::UniqueViolation { .. }) => {
                let game = self.get_by_package_name(package_name).await?.ok_or(DbError::NotFound)?;
                insert_contexts(&mut *self.db, game.id, &[context.to_string()]).await?;
                self.get_by_id(game.id).await?.ok_or(DbError::NotFound)
            }
            Err(e) => Err(e),
        }
    }
}
