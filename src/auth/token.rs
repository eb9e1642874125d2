// JWT minting and validation (HS256)

use crate::core::errors::AttendanceError;
use crate::core::models::{Role, User};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Identity established by the auth middleware, available to handlers via
/// request extensions.
#[derive(Debug, Clone)]
pub struct AuthIdentity {
    pub user_id: String,
    pub email: String,
    pub role: Role,
}

pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
}

impl TokenService {
    pub fn new(secret: &str, ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        }
    }

    pub fn mint(&self, user: &User) -> Result<String, AttendanceError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
            iat: now,
            exp: now + self.ttl_secs,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AttendanceError::Internal(format!("token encoding: {}", e)))
    }

    pub fn verify(&self, token: &str) -> Result<AuthIdentity, AttendanceError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|e| AttendanceError::Unauthorized(format!("invalid token: {}", e)))?;
        Ok(AuthIdentity {
            user_id: data.claims.sub,
            email: data.claims.email,
            role: data.claims.role,
        })
    }
}
