//! Database record models.
//!
//! Request structs (`*CreateDBRequest`, `*UpdateDBRequest`) are what repositories accept;
//! response structs (`*DBResponse`) are what they return. Both are kept separate from the
//! API models in [`crate::api::models`] so storage and wire formats can evolve independently.
//!
//! - [`users`]: user accounts
//! - [`games`]: the game directory and recognised input contexts
//! - [`templates`]: user-authored text templates
//! - [`discord`]: linked Discord accounts and the server/channel cache

pub mod discord;
pub mod games;
pub mod templates;
pub mod users;
