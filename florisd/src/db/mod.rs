//! Database layer for data persistence and access.
//!
//! This module implements the data access layer using SQLx with SQLite.
//! It follows the Repository pattern to provide clean abstractions over database operations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (API request handlers)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers - queries)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models - database records)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   SQLite    │
//! └─────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```ignore
//! use florisd::db::handlers::{Games, Repository};
//!
//! async fn example(pool: &sqlx::SqlitePool) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut conn = pool.acquire().await?;
//!     let mut games = Games::new(&mut conn);
//!
//!     if let Some(game) = games.get_by_package_name("com.example.game").await? {
//!         println!("Found game: {}", game.name);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Repositories that touch more than one table open their own transaction on the
//! connection they are given.
//!
//! # Migrations
//!
//! Migrations live in `migrations/` and are embedded with [`crate::migrator`]:
//!
//! ```ignore
//! florisd::migrator().run(&pool).await?;
//! ```

pub mod errors;
pub mod handlers;
pub mod models;
