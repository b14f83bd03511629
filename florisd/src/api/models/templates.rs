//! API request/response models for templates.

use super::games::GameResponse;
use super::pagination::Pagination;
use crate::db::models::templates::TemplateDBResponse;
use crate::types::{GameId, TemplateId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TemplateCreate {
    pub title: String,
    pub content: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_public: bool,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub game_id: Option<GameId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct TemplateUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TemplateResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: TemplateId,
    pub title: String,
    pub content: String,
    pub category: String,
    pub tags: Vec<String>,
    pub is_public: bool,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub game_id: Option<GameId>,
    /// The linked game, when there is one
    pub game: Option<GameResponse>,
    #[schema(value_type = String, format = "uuid")]
    pub owner_id: UserId,
    pub usage_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TemplateDBResponse> for TemplateResponse {
    fn from(db: TemplateDBResponse) -> Self {
        Self {
            id: db.id,
            title: db.title,
            content: db.content,
            category: db.category,
            tags: db.tags,
            is_public: db.is_public,
            game_id: db.game_id,
            game: None,
            owner_id: db.owner_id,
            usage_count: db.usage_count,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

impl TemplateResponse {
    pub fn with_game(mut self, game: Option<GameResponse>) -> Self {
        self.game = game;
        self
    }
}

/// Query parameters for template listings
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListTemplatesQuery {
    /// Only templates linked to this game
    #[param(value_type = Option<String>, format = "uuid")]
    pub game: Option<GameId>,
    pub category: Option<String>,

    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}

/// Query parameters for the per-game template listing
#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct GameTemplatesQuery {
    /// Maximum number of templates to return (default: 20, max: 100)
    #[param(minimum = 1, maximum = 100)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub limit: Option<i64>,
}
