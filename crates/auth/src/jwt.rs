//! Bearer token verification. Tokens are issued by the identity provider;
//! this crate only checks them and extracts the user id.

use crate::error::{AuthError, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // User ID
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub token_type: TokenType,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| AuthError::InvalidToken("subject is not a user id".to_string()))
    }
}

/// Kinds the identity provider issues. Only access tokens authorize requests.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    access_token_exp_hours: i64,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            algorithm: Algorithm::HS256,
            access_token_exp_hours: 1,
        }
    }

    pub fn from_env() -> Result<Self> {
        let secret = std::env::var("JWT_SECRET")
            .map_err(|_| AuthError::Configuration("JWT_SECRET must be set".to_string()))?;
        Self::from_secret(&secret)
    }

    /// Like [`JwtService::new`], refusing short secrets.
    pub fn from_secret(secret: &str) -> Result<Self> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::Configuration(format!(
                "JWT secret must be at least {} characters",
                MIN_SECRET_LEN
            )));
        }

        let mut service = Self::new(secret);
        service.access_token_exp_hours = std::env::var("JWT_EXPIRATION_HOURS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);

        Ok(service)
    }

    /// Issue an access token for `user_id`. Used by tests and local tooling;
    /// production tokens come from the identity provider.
    pub fn generate_access_token(&self, user_id: Uuid) -> Result<String> {
        self.generate(user_id, TokenType::Access, Duration::hours(self.access_token_exp_hours))
    }

    fn generate(&self, user_id: Uuid, token_type: TokenType, ttl: Duration) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            token_type,
        };

        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Validate and decode a token
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let validation = Validation::new(self.algorithm);
        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)?;
        Ok(token_data.claims)
    }

    /// Validate an access token and return the user it was issued to
    pub fn verify_access_token(&self, token: &str) -> Result<Uuid> {
        let claims = self.validate_token(token)?;

        if claims.token_type != TokenType::Access {
            return Err(AuthError::InvalidToken(
                "Token is not an access token".to_string(),
            ));
        }

        claims.user_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-min-32-characters-long";

    #[test]
    fn test_generate_and_verify_access_token() {
        let jwt = JwtService::new(SECRET);
        let user_id = Uuid::new_v4();

        let token = jwt
            .generate_access_token(user_id)
            .expect("Failed to generate token");

        let verified = jwt
            .verify_access_token(&token)
            .expect("Failed to verify token");

        assert_eq!(verified, user_id);
    }

    #[test]
    fn test_refresh_token_is_not_an_access_token() {
        let jwt = JwtService::new(SECRET);
        let refresh_token = jwt
            .generate(Uuid::new_v4(), TokenType::Refresh, Duration::days(30))
            .unwrap();

        let result = jwt.verify_access_token(&refresh_token);
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let issuer = JwtService::new(SECRET);
        let verifier = JwtService::new("another-secret-key-min-32-characters-long");
        let token = issuer.generate_access_token(Uuid::new_v4()).unwrap();

        assert!(verifier.verify_access_token(&token).is_err());
    }

    #[test]
    fn test_expired_token() {
        let jwt = JwtService::new(SECRET);
        let token = jwt
            .generate(Uuid::new_v4(), TokenType::Access, Duration::hours(-2))
            .unwrap();

        assert!(matches!(
            jwt.verify_access_token(&token),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn test_short_secret_is_refused() {
        assert!(matches!(
            JwtService::from_secret("short"),
            Err(AuthError::Configuration(_))
        ));
    }

    #[test]
    fn test_subject_must_be_uuid() {
        let claims = Claims {
            sub: "not-a-uuid".to_string(),
            exp: 0,
            iat: 0,
            jti: String::new(),
            token_type: TokenType::Access,
        };
        assert!(claims.user_id().is_err());
    }
}
