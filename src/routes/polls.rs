//! HTTP routes for polls and voting

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::dto::{PollView, VoteView};
use super::extract::{AdminUser, AuthUser, MaybeUser};
use crate::ledger::ConsciousnessInput;
use crate::server::AppState;
use crate::services::polls::TRENDING_LIMIT;
use crate::services::{CreatePollInput, PollEdit};
use crate::store::TagCount;
use crate::types::{parse_id, Result};

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    #[serde(default)]
    pub option_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryResponse {
    pub total_votes: i64,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// GET /api/polls - approved feed
pub async fn feed(
    State(state): State<Arc<AppState>>,
    MaybeUser(viewer): MaybeUser,
) -> Result<Json<Vec<PollView>>> {
    let polls = state.polls.feed().await?;
    Ok(Json(PollView::list(&polls, viewer.as_ref().map(|u| &u.id))))
}

pub async fn create_poll(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(input): Json<CreatePollInput>,
) -> Result<(StatusCode, Json<PollView>)> {
    let poll = state.polls.create_poll(&user, input).await?;
    Ok((StatusCode::CREATED, Json(PollView::new(&poll, Some(&user.id)))))
}

pub async fn trending(State(state): State<Arc<AppState>>) -> Result<Json<Vec<TagCount>>> {
    Ok(Json(state.polls.trending(TRENDING_LIMIT).await?))
}

pub async fn my_polls(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<PollView>>> {
    let polls = state.polls.my_polls(&user).await?;
    Ok(Json(PollView::list(&polls, Some(&user.id))))
}

/// GET /api/polls/pending - moderation queue
pub async fn pending(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
) -> Result<Json<Vec<PollView>>> {
    let polls = state.polls.pending().await?;
    Ok(Json(PollView::list(&polls, None)))
}

pub async fn moderate(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<PollView>> {
    let id = parse_id(&id, "Poll")?;
    let poll = state.polls.moderate(&id, &req.status).await?;
    Ok(Json(PollView::new(&poll, None)))
}

pub async fn get_poll(
    State(state): State<Arc<AppState>>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<String>,
) -> Result<Json<PollView>> {
    let id = parse_id(&id, "Poll")?;
    let poll = state.polls.get_poll(&id).await?;
    Ok(Json(PollView::new(&poll, viewer.as_ref().map(|u| &u.id))))
}

pub async fn update_poll(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(edit): Json<PollEdit>,
) -> Result<Json<PollView>> {
    let id = parse_id(&id, "Poll")?;
    let poll = state.polls.update_poll(&user, &id, edit).await?;
    Ok(Json(PollView::new(&poll, Some(&user.id))))
}

pub async fn delete_poll(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let id = parse_id(&id, "Poll")?;
    state.polls.delete_poll(&user, &id).await?;
    Ok(Json(MessageResponse {
        message: "Poll removed",
    }))
}

pub async fn vote(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(req): Json<VoteRequest>,
) -> Result<Json<VoteView>> {
    let poll_id = parse_id(&id, "Poll")?;
    let option_id = parse_id(&req.option_id, "Option")?;
    let receipt = state.ledger.cast_vote(&user, &poll_id, &option_id).await?;
    Ok(Json(VoteView::from(&receipt)))
}

pub async fn add_consciousness_entry(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(input): Json<ConsciousnessInput>,
) -> Result<(StatusCode, Json<EntryResponse>)> {
    let poll_id = parse_id(&id, "Poll")?;
    let total_votes = state
        .ledger
        .add_consciousness_entry(&user, &poll_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(EntryResponse { total_votes })))
}
