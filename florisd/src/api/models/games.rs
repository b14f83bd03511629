//! API request/response models for the game directory.

use crate::db::models::games::GameDBResponse;
use crate::types::GameId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GameCreate {
    pub name: String,
    /// Android application id, e.g. `com.example.game`
    pub package_name: String,
    pub icon_url: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub input_contexts: Vec<String>,
}

/// Partial update; the package name cannot be changed
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct GameUpdate {
    pub name: Option<String>,
    pub icon_url: Option<String>,
    pub description: Option<String>,
    /// Replaces the stored list when present
    pub input_contexts: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GameResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: GameId,
    pub name: String,
    pub package_name: String,
    pub icon_url: Option<String>,
    pub description: Option<String>,
    pub input_contexts: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<GameDBResponse> for GameResponse {
    fn from(db: GameDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            package_name: db.package_name,
            icon_url: db.icon_url,
            description: db.description,
            input_contexts: db.input_contexts,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ReportContextQuery {
    pub package_name: String,
    /// Identifier of the input field the keyboard was opened in
    pub context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReportContextResponse {
    pub success: bool,
    #[schema(value_type = String, format = "uuid")]
    pub game_id: GameId,
}
