//! Extractors that resolve the caller from an `Authorization: Bearer <token>` header.

use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::session,
    db::handlers::{Repository, Users},
    errors::{Error, Result},
};
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use tracing::{debug, instrument, trace};

/// Pull the token out of the `Authorization` header. The scheme is matched case-insensitively.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let Some(token) = bearer_token(parts) else {
            trace!("No bearer token on request");
            return Err(Error::unauthenticated("Not authenticated"));
        };

        let user_id = session::verify_session_token(token, &state.config)?;

        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        let user = Users::new(&mut conn)
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| Error::not_found("User", user_id))?;

        if !user.is_active {
            return Err(Error::bad_request("Inactive user"));
        }

        debug!("Authenticated user {}", user.id);
        Ok(user.into())
    }
}

/// An authenticated caller with the superuser flag set
#[derive(Debug, Clone)]
pub struct RequireSuperuser(pub CurrentUser);

impl FromRequestParts<AppState> for RequireSuperuser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_superuser {
            return Err(Error::forbidden("Not enough permissions"));
        }
        Ok(RequireSuperuser(user))
    }
}
