//! Repository implementations for database access.
//!
//! Each repository wraps a `&mut SqliteConnection` (a pooled connection or a transaction),
//! binds parameters at runtime and returns models from [`crate::db::models`].
//!
//! - [`Users`]: user accounts and credential lookup
//! - [`Games`]: the game directory and input-context reporting
//! - [`Templates`]: template CRUD, visibility-aware listings and usage counting
//! - [`DiscordAccounts`]: linked Discord accounts and their OAuth tokens
//! - [`DiscordChannels`]: the server/channel cache behind deep links
//!
//! ```ignore
//! use florisd::db::handlers::{Templates, Repository};
//!
//! let mut conn = pool.acquire().await?;
//! let mut repo = Templates::new(&mut conn);
//! let template = repo.get_by_id(id).await?;
//! ```

pub mod discord;
pub mod games;
pub mod repository;
pub mod templates;
pub mod users;

pub use discord::{DiscordAccounts, DiscordChannels};
pub use games::Games;
pub use repository::Repository;
pub use templates::Templates;
pub use users::Users;
