//! Database models for text templates.

use crate::api::models::templates::TemplateUpdate;
use crate::types::{GameId, TemplateId, UserId};
use chrono::{DateTime, Utc};

/// Database request for creating a template
#[derive(Debug, Clone)]
pub struct TemplateCreateDBRequest {
    pub title: String,
    pub content: String,
    pub category: String,
    pub game_id: Option<GameId>,
    pub owner_id: UserId,
    pub is_public: bool,
    pub tags: Vec<String>,
}

/// Partial update. The owner and game link are fixed at creation.
#[derive(Debug, Clone, Default)]
pub struct TemplateUpdateDBRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_public: Option<bool>,
}

impl From<TemplateUpdate> for TemplateUpdateDBRequest {
    fn from(api: TemplateUpdate) -> Self {
        Self {
            title: api.title,
            content: api.content,
            category: api.category,
            tags: api.tags,
            is_public: api.is_public,
        }
    }
}

/// Database response for a template
#[derive(Debug, Clone)]
pub struct TemplateDBResponse {
    pub id: TemplateId,
    pub title: String,
    pub content: String,
    pub category: String,
    pub game_id: Option<GameId>,
    pub owner_id: UserId,
    pub usage_count: i64,
    pub is_public: bool,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
