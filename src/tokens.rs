use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Admin ID
    pub email: String,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn admin_id(&self) -> Result<i32> {
        self.sub
            .parse()
            .map_err(|_| AppError::Unauthorized("invalid token subject".to_string()))
    }
}

/// Issues and checks HS256 bearer tokens for admins.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl_hours: i64,
    refresh_ttl_hours: i64,
}

impl TokenIssuer {
    pub fn new(secret: &str, access_ttl_hours: i64, refresh_ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl_hours,
            refresh_ttl_hours,
        }
    }

    pub fn issue(&self, admin_id: i32, email: &str, kind: TokenKind) -> Result<String> {
        let now = Utc::now();
        let hours = match kind {
            TokenKind::Access => self.access_ttl_hours,
            TokenKind::Refresh => self.refresh_ttl_hours,
        };
        let expires = Duration::try_hours(hours)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| AppError::Internal(format!("token lifetime of {} hours is out of range", hours)))?;
        let claims = Claims {
            sub: admin_id.to_string(),
            email: email.to_string(),
            kind,
            iat: now.timestamp(),
            exp: expires.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("JWT encoding error: {}", e)))
    }

    /// Decodes `token` and insists it is of the `expected` kind.
    pub fn validate(&self, token: &str, expected: TokenKind) -> Result<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            tracing::debug!("Rejected bearer token: {}", e);
            AppError::Unauthorized("invalid or expired token".to_string())
        })?;

        if data.claims.kind != expected {
            return Err(AppError::Unauthorized("wrong token type".to_string()));
        }
        Ok(data.claims)
    }
}
