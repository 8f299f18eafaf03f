use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use super::AppError;
use crate::metrics::StatsSnapshot;
use crate::server::ProfilerState;
use crate::storage::CollectionRecord;

// ─── GET {prefix}/api/collections/:token ─────────────────────────

pub async fn get_collection(
    State(state): State<Arc<ProfilerState>>,
    Path(token): Path<String>,
) -> Result<Json<CollectionRecord>, AppError> {
    state
        .store
        .find(&token)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("collection '{token}' not found")))
}

// ─── GET {prefix}/api/stats ──────────────────────────────────────

pub async fn get_stats(State(state): State<Arc<ProfilerState>>) -> Json<StatsSnapshot> {
    Json(state.stats.snapshot())
}
