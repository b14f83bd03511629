//! API request and response data models.
//!
//! These define the public API contract and are kept separate from the database models
//! in [`crate::db::models`]. All models are annotated with `utoipa` for the OpenAPI document.
//!
//! - [`auth`]: login form, token and OAuth payloads
//! - [`users`]: registration and profile responses
//! - [`games`]: game directory entries and context reports
//! - [`templates`]: template payloads and listing queries
//! - [`discord`]: servers, channels and deep links
//! - [`pagination`]: shared `skip`/`limit` query parameters

pub mod auth;
pub mod discord;
pub mod games;
pub mod pagination;
pub mod templates;
pub mod users;

use serde::Serialize;
use utoipa::ToSchema;

/// Acknowledgement returned by endpoints with nothing else to say
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}
