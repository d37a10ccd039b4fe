//! Request extractors for authenticated routes
//!
//! Tokens come from `Authorization: Bearer` or the session cookie. The user
//! record is always loaded fresh so role and settings changes apply at once.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use std::sync::Arc;

use crate::auth::{extract_token, Role};
use crate::db::schemas::UserDoc;
use crate::server::AppState;
use crate::types::PollxError;

/// A signed-in user
pub struct AuthUser(pub UserDoc);

/// A signed-in admin
pub struct AdminUser(pub UserDoc);

/// The signed-in user, if any. Bad or missing credentials yield `None`.
pub struct MaybeUser(pub Option<UserDoc>);

async fn authenticate(parts: &Parts, state: &AppState) -> Result<UserDoc, PollxError> {
    let header = parts.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let cookie = parts.headers.get(COOKIE).and_then(|v| v.to_str().ok());

    let token = extract_token(header, cookie)
        .ok_or_else(|| PollxError::Unauthorized("Not authorized, no token".into()))?;

    let claims = state.jwt.verify_token(token)?;
    let user_id = claims.user_id()?;

    state
        .stores
        .users
        .find_by_id(&user_id)
        .await?
        .ok_or_else(|| PollxError::Unauthorized("Not authorized, user not found".into()))
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = PollxError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state).await.map(AuthUser)
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = PollxError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = authenticate(parts, state).await?;
        if !user.role.satisfies(Role::Admin) {
            return Err(PollxError::Unauthorized("Not authorized as an admin".into()));
        }
        Ok(AdminUser(user))
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for MaybeUser {
    type Rejection = PollxError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(authenticate(parts, state).await.ok()))
    }
}
