//! HTTP routes for candidacies and elections

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use super::dto::{views, CandidateView, ElectionView};
use super::extract::{AdminUser, AuthUser};
use crate::server::AppState;
use crate::services::{ApplyInput, CreateElectionInput, JoinInput};
use crate::types::{parse_id, Result};

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    #[serde(default)]
    pub status: String,
}

pub async fn apply(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(input): Json<ApplyInput>,
) -> Result<(StatusCode, Json<CandidateView>)> {
    let candidate = state.elections.apply(&user, input).await?;
    Ok((StatusCode::CREATED, Json(CandidateView::from(&candidate))))
}

/// GET /api/election/me - `null` until the user applies
pub async fn my_candidacy(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Option<CandidateView>>> {
    let candidate = state.elections.my_candidacy(&user).await?;
    Ok(Json(candidate.as_ref().map(CandidateView::from)))
}

pub async fn approved_candidates(
    State(state): State<Arc<AppState>>,
    AuthUser(_): AuthUser,
) -> Result<Json<Vec<CandidateView>>> {
    let candidates = state.elections.approved_candidates().await?;
    Ok(Json(views(&candidates)))
}

pub async fn join_election(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(input): Json<JoinInput>,
) -> Result<Json<CandidateView>> {
    let candidate = state.elections.join_election(&user, input).await?;
    Ok(Json(CandidateView::from(&candidate)))
}

pub async fn all_candidates(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
) -> Result<Json<Vec<CandidateView>>> {
    let candidates = state.elections.all_candidates().await?;
    Ok(Json(views(&candidates)))
}

pub async fn set_candidate_status(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<CandidateView>> {
    let id = parse_id(&id, "Candidate")?;
    let candidate = state.elections.set_candidate_status(&id, &req.status).await?;
    Ok(Json(CandidateView::from(&candidate)))
}

pub async fn create_election(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(input): Json<CreateElectionInput>,
) -> Result<(StatusCode, Json<ElectionView>)> {
    let election = state.elections.create_election(&admin, input).await?;
    Ok((StatusCode::CREATED, Json(ElectionView::from(&election))))
}

pub async fn list_elections(
    State(state): State<Arc<AppState>>,
    AuthUser(_): AuthUser,
) -> Result<Json<Vec<ElectionView>>> {
    let elections = state.elections.list_elections().await?;
    Ok(Json(views(&elections)))
}

pub async fn set_election_status(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<ElectionView>> {
    let id = parse_id(&id, "Election")?;
    let election = state.elections.set_election_status(&id, &req.status).await?;
    Ok(Json(ElectionView::from(&election)))
}
