//! Session token handling (JWT)

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Issuer claim stamped into every session token.
pub const ISSUER: &str = "bugtrack";
/// Audience claim stamped into every session token.
pub const AUDIENCE: &str = "bugtrack-api";

/// Claims carried by a session token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionClaims {
    /// Subject (user ID)
    pub sub: Uuid,
    /// Issued at (timestamp)
    pub iat: i64,
    /// Expiration time (timestamp)
    pub exp: i64,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
}

impl SessionClaims {
    pub fn new(user_id: Uuid, validity: Duration) -> Self {
        let now = Utc::now();
        let exp = now + validity;

        Self {
            sub: user_id,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

/// Session token errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session encoding error: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),

    #[error("Session expired")]
    Expired,

    #[error("Invalid session token")]
    InvalidToken,
}

/// Validates and issues session tokens using HMAC-SHA256
pub struct SessionValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl SessionValidator {
    /// Create a validator for the given symmetric secret
    ///
    /// Validates:
    /// - Signature (using the secret)
    /// - Token expiration
    /// - Issuer and audience claims
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.set_issuer(&[ISSUER]);
        validation.set_audience(&[AUDIENCE]);

        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn validate(&self, token: &str) -> Result<SessionClaims, SessionError> {
        let token_data = decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => SessionError::Expired,
                _ => SessionError::InvalidToken,
            })?;

        if token_data.claims.is_expired() {
            return Err(SessionError::Expired);
        }

        Ok(token_data.claims)
    }

    /// Encode a session token using HMAC-SHA256 (symmetric secret)
    pub fn encode(secret: &[u8], claims: &SessionClaims) -> Result<String, SessionError> {
        let header = Header::new(Algorithm::HS256);
        let encoding_key = EncodingKey::from_secret(secret);

        Ok(encode(&header, claims, &encoding_key)?)
    }
}
