//! JWT session token creation and verification.

use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::{config::Config, errors::Error, types::UserId};

/// JWT session claims
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: UserId, // Subject (user ID)
    pub exp: i64,    // Expiration time
    pub iat: i64,    // Issued at
}

impl SessionClaims {
    pub fn new(user_id: UserId, config: &Config) -> Self {
        let now = Utc::now();
        let exp = now + config.auth.jwt_expiry;

        Self {
            sub: user_id,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        }
    }
}

fn secret_key(config: &Config) -> Result<&str, Error> {
    config.secret_key.as_deref().ok_or_else(|| Error::Internal {
        operation: "JWT sessions: secret_key is required".to_string(),
    })
}

/// Create a signed session token for a user
pub fn create_session_token(user_id: UserId, config: &Config) -> Result<String, Error> {
    encode_claims(&SessionClaims::new(user_id, config), config)
}

pub(crate) fn encode_claims(claims: &SessionClaims, config: &Config) -> Result<String, Error> {
    let key = EncodingKey::from_secret(secret_key(config)?.as_bytes());
    encode(&Header::new(config.auth.jwt_algorithm), claims, &key).map_err(|e| Error::Internal {
        operation: format!("create JWT: {e}"),
    })
}

/// Verify a session token and return the subject's user id.
///
/// Expired tokens are `Unauthenticated`; anything that fails signature or shape
/// checks is `Forbidden`.
pub fn verify_session_token(token: &str, config: &Config) -> Result<UserId, Error> {
    let key = DecodingKey::from_secret(secret_key(config)?.as_bytes());
    let mut validation = Validation::new(config.auth.jwt_algorithm);
    validation.leeway = 0;

    let token_data = decode::<SessionClaims>(token, &key, &validation).map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => Error::unauthenticated("Token expired"),

        ErrorKind::InvalidToken
        | ErrorKind::InvalidSignature
        | ErrorKind::MissingRequiredClaim(_)
        | ErrorKind::InvalidSubject
        | ErrorKind::ImmatureSignature
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_)
        | ErrorKind::InvalidAlgorithm => Error::forbidden("Could not validate credentials"),

        _ => Error::Internal {
            operation: format!("JWT verification: {e}"),
        },
    })?;

    Ok(token_data.claims.sub)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use std::time::Duration;
    use uuid::Uuid;

    fn create_test_config() -> Config {
        Config {
            secret_key: Some("test-secret-key-for-testing".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_round_trip_returns_subject() {
        let config = create_test_config();
        let user_id = Uuid::new_v4();

        let token = create_session_token(user_id, &config).unwrap();
        assert_eq!(verify_session_token(&token, &config).unwrap(), user_id);
    }

    #[test]
    fn test_token_lifetime_follows_config() {
        let mut config = create_test_config();
        config.auth.jwt_expiry = Duration::from_secs(3600);

        let claims = SessionClaims::new(Uuid::new_v4(), &config);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_token_accepted_before_expiry_rejected_after() {
        let config = create_test_config();
        let user_id = Uuid::new_v4();
        let now = Utc::now().timestamp();

        let live = SessionClaims {
            sub: user_id,
            iat: now - 100,
            exp: now + 100,
        };
        let token = encode_claims(&live, &config).unwrap();
        assert_eq!(verify_session_token(&token, &config).unwrap(), user_id);

        let expired = SessionClaims {
            sub: user_id,
            iat: now - 200,
            exp: now - 100,
        };
        let token = encode_claims(&expired, &config).unwrap();
        let err = verify_session_token(&token, &config).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.user_message(), "Token expired");
    }

    #[test]
    fn test_wrong_secret_is_forbidden() {
        let config = create_test_config();
        let token = create_session_token(Uuid::new_v4(), &config).unwrap();

        let other = Config {
            secret_key: Some("a-different-secret".to_string()),
            ..Default::default()
        };
        let err = verify_session_token(&token, &other).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_malformed_token_is_forbidden() {
        let config = create_test_config();
        let err = verify_session_token("not.a.jwt", &config).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_algorithm_mismatch_is_forbidden() {
        let config = create_test_config();
        let token = create_session_token(Uuid::new_v4(), &config).unwrap();

        let mut strict = create_test_config();
        strict.auth.jwt_algorithm = jsonwebtoken::Algorithm::HS512;
        let err = verify_session_token(&token, &strict).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_missing_secret_is_internal_error() {
        let config = Config::default();
        assert!(matches!(
            create_session_token(Uuid::new_v4(), &config),
            Err(Error::Internal { .. })
        ));
    }
}
