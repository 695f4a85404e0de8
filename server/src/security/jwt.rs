/// JWT token generation and validation (HS256)
///
/// Access tokens are short-lived and used for API authentication; refresh
/// tokens are long-lived and can only be exchanged for a new pair. The
/// `token_type` claim prevents a refresh token from being used as an
/// access token and vice versa.
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{AppError, Result};
use crate::models::TokenPairResponse;

pub const TOKEN_TYPE_ACCESS: &str = "access";
pub const TOKEN_TYPE_REFRESH: &str = "refresh";

const JWT_ALGORITHM: Algorithm = Algorithm::HS256;

/// JWT claims: standard claims plus token type and identity fields
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Token type: "access" or "refresh"
    pub token_type: String,
    /// Email address
    pub email: String,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| AppError::Unauthorized("invalid token subject".to_string()))
    }
}

/// Holds the signing keys and TTLs; shared via app data.
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtManager {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            access_ttl: Duration::seconds(config.access_ttl_secs),
            refresh_ttl: Duration::seconds(config.refresh_ttl_secs),
        }
    }

    /// Generate an access + refresh token pair for a user.
    pub fn generate_token_pair(&self, user_id: Uuid, email: &str) -> Result<TokenPairResponse> {
        let access_token = self.generate(user_id, email, TOKEN_TYPE_ACCESS, self.access_ttl)?;
        let refresh_token = self.generate(user_id, email, TOKEN_TYPE_REFRESH, self.refresh_ttl)?;

        Ok(TokenPairResponse {
            access_token,
            refresh_token,
            token_type: "Bearer",
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    fn generate(
        &self,
        user_id: Uuid,
        email: &str,
        token_type: &str,
        ttl: Duration,
    ) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            token_type: token_type.to_string(),
            email: email.to_string(),
        };

        Ok(encode(
            &Header::new(JWT_ALGORITHM),
            &claims,
            &self.encoding_key,
        )?)
    }

    /// Validate a token and check it carries the expected type.
    pub fn validate(&self, token: &str, expected_type: &str) -> Result<Claims> {
        let validation = Validation::new(JWT_ALGORITHM);
        let data = decode::<Claims>(token, &self.decoding_key, &validation)?;

        if data.claims.token_type != expected_type {
            return Err(AppError::Unauthorized(format!(
                "expected {expected_type} token"
            )));
        }

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> JwtManager {
        JwtManager::new(&AuthConfig {
            jwt_secret: "test-secret-test-secret-test-secret".to_string(),
            access_ttl_secs: 900,
            refresh_ttl_secs: 604_800,
        })
    }

    #[test]
    fn pair_round_trips() {
        let manager = manager();
        let user_id = Uuid::new_v4();
        let pair = manager.generate_token_pair(user_id, "a@b.com").unwrap();

        let claims = manager
            .validate(&pair.access_token, TOKEN_TYPE_ACCESS)
            .unwrap();
        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.email, "a@b.com");

        let claims = manager
            .validate(&pair.refresh_token, TOKEN_TYPE_REFRESH)
            .unwrap();
        assert_eq!(claims.user_id().unwrap(), user_id);
    }

    #[test]
    fn refresh_token_rejected_as_access() {
        let manager = manager();
        let pair = manager
            .generate_token_pair(Uuid::new_v4(), "a@b.com")
            .unwrap();
        let err = manager
            .validate(&pair.refresh_token, TOKEN_TYPE_ACCESS)
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn token_signed_with_other_secret_rejected() {
        let manager = manager();
        let other = JwtManager::new(&AuthConfig {
            jwt_secret: "other-secret-other-secret-other-secret".to_string(),
            access_ttl_secs: 900,
            refresh_ttl_secs: 604_800,
        });
        let pair = other.generate_token_pair(Uuid::new_v4(), "a@b.com").unwrap();
        assert!(manager
            .validate(&pair.access_token, TOKEN_TYPE_ACCESS)
            .is_err());
    }
}
