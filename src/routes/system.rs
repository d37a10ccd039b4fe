//! System-wide aggregates

use axum::extract::State;
use axum::Json;
use std::sync::Arc;

use crate::aggregate::current_mood;
use crate::evaluator::MoodReading;
use crate::server::AppState;
use crate::types::Result;

/// GET /api/system/mood
pub async fn mood(State(state): State<Arc<AppState>>) -> Result<Json<MoodReading>> {
    let reading = current_mood(state.stores.system.as_ref()).await?;
    Ok(Json(reading))
}
