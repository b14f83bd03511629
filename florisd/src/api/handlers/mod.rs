//! HTTP request handlers for all API endpoints.
//!
//! Each handler validates and deserializes the request, resolves the caller through the
//! [`CurrentUser`](crate::api::models::users::CurrentUser) extractor where the route is
//! protected, runs the operation against the database repositories, and serializes the
//! response.
//!
//! # Handler Modules
//!
//! - [`auth`]: login, registration, the current user, and Discord account linking
//! - [`discord`]: server listing, recent deep links, and channel access tracking
//! - [`games`]: the game directory and input-context reports
//! - [`root`]: welcome and health endpoints
//! - [`templates`]: template CRUD, usage counting, and per-game suggestions
//!
//! Handlers return [`crate::errors::Error`], which renders as `{"detail": "..."}` with the
//! matching status code.

pub mod auth;
pub mod discord;
pub mod games;
pub mod root;
pub mod templates;
