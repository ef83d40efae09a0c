//! Bearer tokens: HS256 JWTs whose subject is the user id.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::error::AppError;

/// Signing settings for access tokens. Constructed once from [`crate::config::AppConfig`].
#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub token_ttl_hours: i64,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("token_ttl_hours", &self.token_ttl_hours)
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

#[instrument(skip(config))]
pub fn issue_token(user_id: i64, config: &AuthConfig) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (now + Duration::hours(config.token_ttl_hours)).timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
}

/// Returns the user id encoded in a valid, unexpired token.
#[instrument(skip_all)]
pub fn decode_token(token: &str, config: &AuthConfig) -> Result<i64, AppError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        warn!(error = %e, "Rejected access token");
        AppError::Authentication("Invalid or expired token".to_string())
    })?;

    data.claims
        .sub
        .parse::<i64>()
        .map_err(|_| AppError::Authentication("Invalid or expired token".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AuthConfig {
        AuthConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            token_ttl_hours: 24,
        }
    }

    #[test]
    fn test_issue_and_decode() {
        let config = test_config();
        let token = issue_token(42, &config).expect("token should be issued");
        assert_eq!(decode_token(&token, &config).unwrap(), 42);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issue_token(7, &test_config()).unwrap();
        let other = AuthConfig {
            secret: "another-secret".to_string(),
            token_ttl_hours: 24,
        };

        assert!(matches!(
            decode_token(&token, &other),
            Err(AppError::Authentication(_))
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let config = test_config();
        // well past the default 60 second leeway
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "1".to_string(),
            exp: now - 600,
            iat: now - 1200,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )
        .unwrap();

        assert!(decode_token(&token, &config).is_err());
    }

    #[test]
    fn test_non_numeric_subject_rejected() {
        let config = test_config();
        let claims = Claims {
            sub: "admin".to_string(),
            exp: Utc::now().timestamp() + 600,
            iat: Utc::now().timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )
        .unwrap();

        assert!(decode_token(&token, &config).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(decode_token("not-a-jwt", &test_config()).is_err());
    }
}
