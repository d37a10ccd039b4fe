//! HTTP routes for accounts
//!
//! - POST /api/auth/signup  - Create an account and get a token
//! - POST /api/auth/login   - Authenticate and get a token
//! - GET  /api/auth/profile - Current profile
//! - PUT  /api/auth/profile - Edit profile, settings or password
//! - GET  /api/auth/search  - Username autocomplete for mentions

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use super::dto::{views, AuthResponse, UserSummary, UserView};
use super::extract::AuthUser;
use crate::server::AppState;
use crate::services::ProfileUpdate;
use crate::types::Result;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub search: String,
}

pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let session = state
        .accounts
        .signup(&req.username, &req.email, &req.password)
        .await?;
    Ok((StatusCode::CREATED, Json(AuthResponse::from(&session))))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let session = state
        .accounts
        .login(&req.email, &req.password, Utc::now())
        .await?;
    Ok(Json(AuthResponse::from(&session)))
}

pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<UserView>> {
    let user = state.accounts.profile(&user.id, Utc::now()).await?;
    Ok(Json(UserView::from(&user)))
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<AuthResponse>> {
    let session = state.accounts.update_profile(&user, update).await?;
    Ok(Json(AuthResponse::from(&session)))
}

pub async fn search_users(
    State(state): State<Arc<AppState>>,
    AuthUser(_): AuthUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<UserSummary>>> {
    let users = state.accounts.search_users(&query.search).await?;
    Ok(Json(views(&users)))
}
