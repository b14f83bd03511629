//! Database models for the game directory.

use crate::api::models::games::{GameCreate, GameUpdate};
use crate::types::GameId;
use chrono::{DateTime, Utc};

/// Database request for creating a game
#[derive(Debug, Clone)]
pub struct GameCreateDBRequest {
    pub name: String,
    pub package_name: String,
    pub icon_url: Option<String>,
    pub description: Option<String>,
    pub input_contexts: Vec<String>,
}

impl From<GameCreate> for GameCreateDBRequest {
    fn from(api: GameCreate) -> Self {
        Self {
            name: api.name,
            package_name: api.package_name,
            icon_url: api.icon_url,
            description: api.description,
            input_contexts: api.input_contexts,
        }
    }
}

/// Database request for updating a game.
///
/// A provided `input_contexts` list replaces the stored one wholesale.
#[derive(Debug, Clone, Default)]
pub struct GameUpdateDBRequest {
    pub name: Option<String>,
    pub icon_url: Option<String>,
    pub description: Option<String>,
    pub input_contexts: Option<Vec<String>>,
}

impl From<GameUpdate> for GameUpdateDBRequest {
    fn from(api: GameUpdate) -> Self {
        Self {
            name: api.name,
            icon_url: api.icon_url,
            description: api.description,
            input_contexts: api.input_contexts,
        }
    }
}

/// Database response for a game, with its input contexts in reporting order
#[derive(Debug, Clone)]
pub struct GameDBResponse {
    pub id: GameId,
    pub name: String,
    pub package_name: String,
    pub icon_url: Option<String>,
    pub description: Option<String>,
    pub input_contexts: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
