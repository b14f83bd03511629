//! Authentication and authorization.
//!
//! Callers log in with email and password and receive a signed JWT, which they send back as
//! `Authorization: Bearer <token>`. There are no server-side sessions.
//!
//! - [`current_user`]: extractors that resolve the caller ([`CurrentUser`]) or insist on a
//!   superuser ([`current_user::RequireSuperuser`])
//! - [`password`]: Argon2id hashing and verification
//! - [`session`]: token creation and verification
//!
//! ```ignore
//! use florisd::api::models::users::CurrentUser;
//!
//! async fn handler(current_user: CurrentUser) -> String {
//!     format!("Hello, {}!", current_user.email)
//! }
//! ```
//!
//! [`CurrentUser`]: crate::api::models::users::CurrentUser

pub mod current_user;
pub mod password;
pub mod session;
