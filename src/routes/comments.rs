//! HTTP routes for comments

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use super::dto::{views, CommentView};
use super::extract::AuthUser;
use crate::db::schemas::Reaction;
use crate::server::AppState;
use crate::types::{parse_id, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReactRequest {
    #[serde(rename = "type")]
    pub reaction: Reaction,
}

pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<CommentView>>> {
    let poll_id = parse_id(&id, "Poll")?;
    let comments = state.comments.list_comments(&poll_id).await?;
    Ok(Json(views(&comments)))
}

pub async fn add_comment(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(req): Json<CommentRequest>,
) -> Result<(StatusCode, Json<CommentView>)> {
    let poll_id = parse_id(&id, "Poll")?;
    let parent_id = match req.parent_id.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(parse_id(raw, "Parent comment")?),
        _ => None,
    };

    let comment = state
        .comments
        .add_comment(&user, &poll_id, &req.text, parent_id)
        .await?;
    Ok((StatusCode::CREATED, Json(CommentView::from(&comment))))
}

pub async fn react(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path((id, comment_id)): Path<(String, String)>,
    Json(req): Json<ReactRequest>,
) -> Result<Json<CommentView>> {
    let poll_id = parse_id(&id, "Poll")?;
    let comment_id = parse_id(&comment_id, "Comment")?;
    let comment = state
        .comments
        .react(&user, &poll_id, &comment_id, req.reaction)
        .await?;
    Ok(Json(CommentView::from(&comment)))
}
