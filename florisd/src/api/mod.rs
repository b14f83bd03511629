//! API layer for HTTP request handling and data models.
//!
//! - **[`extract`]**: `Json`, `Query`, `Path` and `Form` extractors with JSON error bodies
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! Everything below is mounted under the configured `api_prefix` (default `/api/v1`):
//!
//! - **Auth** (`/auth/*`): login, registration, current user, Discord linking
//! - **Games** (`/games/*`): the game directory and context reports
//! - **Templates** (`/templates/*`): quick-text templates and per-game suggestions
//! - **Discord** (`/discord/*`): servers, channel deep links, access tracking
//!
//! The OpenAPI document is served at `/openapi.json` with a browsable UI at `/docs`.

pub mod extract;
pub mod handlers;
pub mod models;
