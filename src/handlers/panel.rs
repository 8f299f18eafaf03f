use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::views::{HtmlTemplate, IndexTemplate, NotFoundTemplate, ShowTemplate, ToolbarTemplate};
use super::AppError;
use crate::server::ProfilerState;

// ─── GET {prefix}/ ───────────────────────────────────────────────
/// Latest records, newest first, with aggregate latency.

pub async fn index(
    State(state): State<Arc<ProfilerState>>,
) -> Result<HtmlTemplate<IndexTemplate>, AppError> {
    let settings = state.config.settings();
    let records = state.store.recent(settings.history_limit).await?;
    let stats = state.stats.snapshot();
    Ok(HtmlTemplate(IndexTemplate::new(settings.prefix(), &records, stats)))
}

// ─── GET {prefix}/:token ─────────────────────────────────────────

pub async fn show(
    State(state): State<Arc<ProfilerState>>,
    Path(token): Path<String>,
) -> Result<Response, AppError> {
    let prefix = state.config.settings().prefix();
    let Some(record) = state.store.find(&token).await? else {
        let page = NotFoundTemplate {
            prefix: prefix.to_owned(),
            token,
        };
        return Ok((StatusCode::NOT_FOUND, HtmlTemplate(page)).into_response());
    };

    let definitions = state.config.collectors().all();
    let page = ShowTemplate::new(prefix, &record, &definitions, &state.renderer);
    Ok(HtmlTemplate(page).into_response())
}

// ─── GET {prefix}/toolbar/:token ─────────────────────────────────
/// Fragment loaded by the script injected into profiled HTML pages.

pub async fn toolbar(
    State(state): State<Arc<ProfilerState>>,
    Path(token): Path<String>,
) -> Result<Response, AppError> {
    let Some(record) = state.store.find(&token).await? else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };

    let definitions = state.config.collectors().all();
    let prefix = state.config.settings().prefix();
    Ok(HtmlTemplate(ToolbarTemplate::new(prefix, &record, &definitions)).into_response())
}

// ─── POST {prefix}/clean ─────────────────────────────────────────

pub async fn clean(State(state): State<Arc<ProfilerState>>) -> Result<Response, AppError> {
    let removed = state.store.clear().await?;
    state.stats.reset();
    tracing::info!(removed, "Profiler history cleaned");

    let location = format!("{}/", state.config.settings().prefix());
    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}
