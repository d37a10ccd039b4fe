//! HTTP routes for the notification inbox

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use super::dto::{views, NotificationView};
use super::extract::AuthUser;
use crate::server::AppState;
use crate::types::{parse_id, Result};

#[derive(Debug, Serialize)]
pub struct ReadResponse {
    pub updated: u64,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<NotificationView>>> {
    let notifications = state.notifications.list(&user).await?;
    Ok(Json(views(&notifications)))
}

pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ReadResponse>> {
    let id = parse_id(&id, "Notification")?;
    state.notifications.mark_read(&user, &id).await?;
    Ok(Json(ReadResponse { updated: 1 }))
}

pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<ReadResponse>> {
    let updated = state.notifications.mark_all_read(&user).await?;
    Ok(Json(ReadResponse { updated }))
}
