//! Database repository for text templates.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::templates::{TemplateCreateDBRequest, TemplateDBResponse, TemplateUpdateDBRequest},
};
use crate::types::{GameId, TemplateId, UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, types::Json};
use std::collections::HashMap;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Sort order for template listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TemplateOrder {
    /// Most recently updated first
    #[default]
    RecentlyUpdated,
    /// Highest usage count first
    MostUsed,
}

/// Filter for listing templates
#[derive(Debug, Clone, Default)]
pub struct TemplateFilter {
    pub owner_id: Option<UserId>,
    pub game_id: Option<GameId>,
    pub category: Option<String>,
    pub public_only: bool,
    /// Leave out templates owned by this user
    pub exclude_owner_id: Option<UserId>,
    pub order: TemplateOrder,
    pub skip: i64,
    pub limit: i64,
}

impl TemplateFilter {
    /// A user's own templates, newest first
    pub fn owned_by(owner_id: UserId, skip: i64, limit: i64) -> Self {
        Self {
            owner_id: Some(owner_id),
            order: TemplateOrder::RecentlyUpdated,
            skip,
            limit,
            ..Default::default()
        }
    }

    /// Public templates, most used first
    pub fn public(skip: i64, limit: i64) -> Self {
        Self {
            public_only: true,
            order: TemplateOrder::MostUsed,
            skip,
            limit,
            ..Default::default()
        }
    }

    pub fn with_game(mut self, game_id: Option<GameId>) -> Self {
        self.game_id = game_id;
        self
    }

    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = category;
        self
    }
}

#[derive(Debug, Clone, FromRow)]
struct Template {
    pub id: TemplateId,
    pub title: String,
    pub content: String,
    pub category: String,
    pub game_id: Option<GameId>,
    pub owner_id: UserId,
    pub usage_count: i64,
    pub is_public: bool,
    pub tags: Json<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Template> for TemplateDBResponse {
    fn from(t: Template) -> Self {
        Self {
            id: t.id,
            title: t.title,
            content: t.content,
            category: t.category,
            game_id: t.game_id,
            owner_id: t.owner_id,
            usage_count: t.usage_count,
            is_public: t.is_public,
            tags: t.tags.0,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

pub struct Templates<'c> {
    db: &'c mut SqliteConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Templates<'c> {
    type CreateRequest = TemplateCreateDBRequest;
    type UpdateRequest = TemplateUpdateDBRequest;
    type Response = TemplateDBResponse;
    type Id = TemplateId;
    type Filter = TemplateFilter;

    #[instrument(skip(self, request), fields(owner_id = %abbrev_uuid(&request.owner_id), title = %request.title), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let template = sqlx::query_as::<_, Template>(
            r#"
            INSERT INTO templates (id, title, content, category, game_id, owner_id, is_public, tags)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.title)
        .bind(&request.content)
        .bind(&request.category)
        .bind(request.game_id)
        .bind(request.owner_id)
        .bind(request.is_public)
        .bind(Json(&request.tags))
        .fetch_one(&mut *self.db)
        .await?;

        Ok(template.into())
    }

    #[instrument(skip(self), fields(template_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let template = sqlx::query_as::<_, Template>("SELECT * FROM templates WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(template.map(Into::into))
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<TemplateId>) -> Result<HashMap<Self::Id, TemplateDBResponse>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM templates WHERE id IN (");
        let mut separated = query.separated(", ");
        for id in &ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let templates = query.build_query_as::<Template>().fetch_all(&mut *self.db).await?;

        Ok(templates.into_iter().map(|t| (t.id, t.into())).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip, order = ?filter.order), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM templates WHERE 1 = 1");

        if let Some(owner_id) = filter.owner_id {
            query.push(" AND owner_id = ").push_bind(owner_id);
        }
        if let Some(game_id) = filter.game_id {
            query.push(" AND game_id = ").push_bind(game_id);
        }
        if let Some(category) = &filter.category {
            query.push(" AND category = ").push_bind(category.clone());
        }
        if filter.public_only {
            query.push(" AND is_public = 1");
        }
        if let Some(excluded) = filter.exclude_owner_id {
            query.push(" AND owner_id != ").push_bind(excluded);
        }

        query.push(match filter.order {
            TemplateOrder::RecentlyUpdated => " ORDER BY updated_at DESC, rowid DESC",
            TemplateOrder::MostUsed => " ORDER BY usage_count DESC, updated_at DESC, rowid DESC",
        });
        query.push(" LIMIT ").push_bind(filter.limit);
        query.push(" OFFSET ").push_bind(filter.skip);

        let templates = query.build_query_as::<Template>().fetch_all(&mut *self.db).await?;

        Ok(templates.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self), fields(template_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM templates WHERE id = ?").bind(id).execute(&mut *self.db).await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(template_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let template = sqlx::query_as::<_, Template>(
            r#"
            UPDATE templates SET
                title = COALESCE(?, title),
                content = COALESCE(?, content),
                category = COALESCE(?, category),
                tags = COALESCE(?, tags),
                is_public = COALESCE(?, is_public),
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&request.title)
        .bind(&request.content)
        .bind(&request.category)
        .bind(request.tags.as_ref().map(Json))
        .bind(request.is_public)
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(template.into())
    }
}

impl<'c> Templates<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Bump the usage counter. Returns `None` (and does nothing) when the template is gone.
    ///
    /// The increment is a single statement so concurrent uses are all counted.
    #[instrument(skip(self), fields(template_id = %abbrev_uuid(&id)), err)]
    pub async fn increment_usage(&mut self, id: TemplateId) -> Result<Option<TemplateDBResponse>> {
        let template = sqlx::query_as::<_, Template>(
            "UPDATE templates SET usage_count = usage_count + 1 WHERE id = ? RETURNING *",
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(template.map(Into::into))
    }

    /// Templates to offer while the user is in a given game.
    ///
    /// With a viewer: up to `limit` of the viewer's own templates for the game (newest first),
    /// then public templates for the game owned by someone else, most used first, filling
    /// whatever room is left. The viewer's templates are never displaced by public ones.
    ///
    /// Without a viewer: public templates for the game, most used first, paginated by `skip`.
    #[instrument(skip(self), fields(game_id = %abbrev_uuid(&game_id)), err)]
    pub async fn list_for_game(
        &mut self,
        game_id: GameId,
        viewer: Option<UserId>,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<TemplateDBResponse>> {
        let Some(viewer) = viewer else {
            return self.list(&TemplateFilter::public(skip, limit).with_game(Some(game_id))).await;
        };

        let mut templates = self
            .list(&TemplateFilter::owned_by(viewer, 0, limit).with_game(Some(game_id)))
            .await?;

        let remaining = limit - templates.len() as i64;
        if remaining > 0 {
            let mut public = TemplateFilter::public(0, remaining).with_game(Some(game_id));
            public.exclude_owner_id = Some(viewer);
            templates.extend(self.list(&public).await?);
        }

        debug!("Returning {} templates for game", templates.len());
        Ok(templates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_game, create_test_template, create_test_user};
    use sqlx::SqlitePool;
    use std::collections::HashSet;

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_update_and_delete(pool: SqlitePool) {
        let owner = create_test_user(&pool, false).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Templates::new(&mut conn);

        let created = repo
            .create(&TemplateCreateDBRequest {
                title: "gg".to_string(),
                content: "Good game, well played!".to_string(),
                category: "greetings".to_string(),
                game_id: None,
                owner_id: owner.id,
                is_public: false,
                tags: vec!["polite".to_string()],
            })
            .await
            .unwrap();
        assert_eq!(created.usage_count, 0);
        assert_eq!(created.tags, vec!["polite"]);

        let updated = repo
            .update(
                created.id,
                &TemplateUpdateDBRequest {
                    content: Some("GG WP".to_string()),
                    tags: Some(vec![]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "gg");
        assert_eq!(updated.content, "GG WP");
        assert!(updated.tags.is_empty());
        assert!(!updated.is_public);
        assert!(updated.updated_at >= created.updated_at);

        assert!(repo.delete(created.id).await.unwrap());
        assert!(repo.get_by_id(created.id).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_unknown_game_reference_is_rejected(pool: SqlitePool) {
        let owner = create_test_user(&pool, false).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Templates::new(&mut conn);

        let err = repo
            .create(&TemplateCreateDBRequest {
                title: "t".to_string(),
                content: "c".to_string(),
                category: "general".to_string(),
                game_id: Some(Uuid::new_v4()),
                owner_id: owner.id,
                is_public: false,
                tags: vec![],
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_increment_usage(pool: SqlitePool) {
        let owner = create_test_user(&pool, false).await;
        let template = create_test_template(&pool, owner.id, None, false).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Templates::new(&mut conn);

        let bumped = repo.increment_usage(template.id).await.unwrap().unwrap();
        assert_eq!(bumped.usage_count, 1);
        let bumped = repo.increment_usage(template.id).await.unwrap().unwrap();
        assert_eq!(bumped.usage_count, 2);

        assert!(repo.increment_usage(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_filters_and_orders(pool: SqlitePool) {
        let alice = create_test_user(&pool, false).await;
        let bob = create_test_user(&pool, false).await;
        let game = create_test_game(&pool, "com.example.list").await;

        let first = create_test_template(&pool, alice.id, Some(game.id), true).await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = create_test_template(&pool, alice.id, None, false).await;
        let bobs = create_test_template(&pool, bob.id, Some(game.id), true).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Templates::new(&mut conn);

        let mine = repo.list(&TemplateFilter::owned_by(alice.id, 0, 10)).await.unwrap();
        assert_eq!(mine.iter().map(|t| t.id).collect::<Vec<_>>(), vec![second.id, first.id]);

        let mine_in_game = repo
            .list(&TemplateFilter::owned_by(alice.id, 0, 10).with_game(Some(game.id)))
            .await
            .unwrap();
        assert_eq!(mine_in_game.len(), 1);
        assert_eq!(mine_in_game[0].id, first.id);

        repo.increment_usage(bobs.id).await.unwrap();
        let public = repo.list(&TemplateFilter::public(0, 10)).await.unwrap();
        assert_eq!(public.iter().map(|t| t.id).collect::<Vec<_>>(), vec![bobs.id, first.id]);

        let none = repo
            .list(&TemplateFilter::owned_by(alice.id, 0, 10).with_category(Some("nope".to_string())))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_for_game_prioritises_own_templates(pool: SqlitePool) {
        let viewer = create_test_user(&pool, false).await;
        let other = create_test_user(&pool, false).await;
        let game = create_test_game(&pool, "com.example.mixed").await;

        let mut own = HashSet::new();
        for _ in 0..3 {
            // Owned and public: must only appear once
            own.insert(create_test_template(&pool, viewer.id, Some(game.id), true).await.id);
        }
        let mut others = HashSet::new();
        for _ in 0..4 {
            others.insert(create_test_template(&pool, other.id, Some(game.id), true).await.id);
        }
        // Private templates of other users never show up
        create_test_template(&pool, other.id, Some(game.id), false).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Templates::new(&mut conn);

        let result = repo.list_for_game(game.id, Some(viewer.id), 0, 5).await.unwrap();
        assert_eq!(result.len(), 5);
        let ids: Vec<_> = result.iter().map(|t| t.id).collect();
        assert!(ids[..3].iter().all(|id| own.contains(id)));
        assert!(ids[3..].iter().all(|id| others.contains(id)));
        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), ids.len());

        // Limit smaller than the owned count: only own templates, truncated
        let result = repo.list_for_game(game.id, Some(viewer.id), 0, 2).await.unwrap();
        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|t| own.contains(&t.id)));

        // Anonymous: public templates only, including the viewer's public ones
        let result = repo.list_for_game(game.id, None, 0, 100).await.unwrap();
        assert_eq!(result.len(), 7);
        let result = repo.list_for_game(game.id, None, 5, 100).await.unwrap();
        assert_eq!(result.len(), 2);
    }
}
