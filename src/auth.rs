use actix_web::{dev::Payload, error::ErrorUnauthorized, http::header, FromRequest, HttpRequest};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use futures_util::future::{ready, Ready};

use crate::error::{AppError, Result};
use crate::state::SiteStateManager;
use crate::tokens::TokenKind;

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?
        .to_string();

    Ok(password_hash)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid password hash format: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

// Extractor for requests carrying an admin bearer token
pub struct LoggedAdmin {
    pub token: String,
    pub admin_id: i32, // Set by validate()
}

impl FromRequest for LoggedAdmin {
    type Error = actix_web::Error;
    type Future = Ready<std::result::Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let header_value = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        match header_value {
            Some(value) => match value.split_once(' ') {
                Some(("Bearer", token)) if !token.trim().is_empty() => ready(Ok(LoggedAdmin {
                    token: token.trim().to_owned(),
                    admin_id: 0,
                })),
                _ => {
                    tracing::debug!("Malformed Authorization header");
                    ready(Err(ErrorUnauthorized("Invalid authorization header format")))
                }
            },
            None => {
                tracing::debug!("Authorization header missing.");
                ready(Err(ErrorUnauthorized("Authorization header required")))
            }
        }
    }
}

impl LoggedAdmin {
    /// Checks the token signature, expiry and kind; the token is only trusted after this.
    pub fn validate(&mut self, state: &SiteStateManager) -> Result<i32> {
        let claims = state.tokens.validate(&self.token, TokenKind::Access)?;
        self.admin_id = claims.admin_id()?;
        tracing::debug!("Token valid for admin {}", self.admin_id);
        Ok(self.admin_id)
    }
}
