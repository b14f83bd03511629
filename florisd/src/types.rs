//! Common type definitions.
//!
//! All entity IDs are UUIDs wrapped in type aliases:
//!
//! - [`UserId`]: user account identifier
//! - [`GameId`]: game/app directory entry identifier
//! - [`TemplateId`]: text template identifier
//!
//! Discord servers and channels keep the snowflake strings Discord hands out.

use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;
pub type GameId = Uuid;
pub type TemplateId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}
