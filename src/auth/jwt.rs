//! JWT session tokens
//!
//! Tokens are signed with HS256 and carry the account id, username and role.
//! Clients present them as `Authorization: Bearer <token>` or as a `jwt`
//! cookie.

use bson::oid::ObjectId;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::auth::Role;
use crate::types::PollxError;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "jwt";

/// Payload stored in JWT token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Account id (hex ObjectId)
    pub sub: String,
    pub username: String,
    pub role: Role,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

impl Claims {
    /// Parse the subject back into an ObjectId
    pub fn user_id(&self) -> Result<ObjectId, PollxError> {
        ObjectId::parse_str(&self.sub)
            .map_err(|_| PollxError::Unauthorized("Not authorized, token failed".into()))
    }
}

/// JWT validator and generator
#[derive(Clone)]
pub struct JwtValidator {
    secret: String,
    expiry_seconds: u64,
}

impl std::fmt::Debug for JwtValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtValidator")
            .field("expiry_seconds", &self.expiry_seconds)
            .finish_non_exhaustive()
    }
}

impl JwtValidator {
    /// Create a new JWT validator
    ///
    /// Returns an error if the secret is empty
    pub fn new(secret: String, expiry_seconds: u64) -> Result<Self, PollxError> {
        if secret.is_empty() {
            return Err(PollxError::Config("JWT_SECRET must not be empty".into()));
        }

        Ok(Self {
            secret,
            expiry_seconds,
        })
    }

    /// Generate a session token for an account
    pub fn generate_token(
        &self,
        user_id: &ObjectId,
        username: &str,
        role: Role,
    ) -> Result<String, PollxError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| PollxError::Auth(format!("System time error: {}", e)))?
            .as_secs();

        let claims = Claims {
            sub: user_id.to_hex(),
            username: username.to_string(),
            role,
            iat: now,
            exp: now + self.expiry_seconds,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| PollxError::Auth(format!("Failed to generate token: {}", e)))
    }

    /// Verify and decode a token
    pub fn verify_token(&self, token: &str) -> Result<Claims, PollxError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|err| {
            use jsonwebtoken::errors::ErrorKind;
            let msg = match err.kind() {
                ErrorKind::ExpiredSignature => "Not authorized, token expired",
                ErrorKind::InvalidSignature => "Not authorized, invalid signature",
                _ => "Not authorized, token failed",
            };
            PollxError::Unauthorized(msg.into())
        })
    }
}

/// Extract token from Authorization header.
/// Supports "Bearer <token>" format only.
pub fn extract_token_from_header(auth_header: Option<&str>) -> Option<&str> {
    let token = auth_header?.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Extract the session token from a Cookie header
pub fn extract_token_from_cookie(cookie_header: Option<&str>) -> Option<&str> {
    cookie_header?.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE && !value.is_empty()).then_some(value)
    })
}

/// Header first, then cookie
pub fn extract_token<'a>(
    auth_header: Option<&'a str>,
    cookie_header: Option<&'a str>,
) -> Option<&'a str> {
    extract_token_from_header(auth_header).or_else(|| extract_token_from_cookie(cookie_header))
}
