//! Trace / Job Timeline Endpoints
//!
//! 오래된 순 정렬, 최대 `TIMELINE_MAX_ROWS` 행

use axum::{extract::State, Json};

use super::AdminPath;
use crate::db::EventLogEntry;
use crate::error::ApiError;
use crate::AppState;

/// GET /admin/v1/traces/:trace_id/events
pub async fn trace_events(
    State(state): State<AppState>,
    AdminPath(trace_id): AdminPath<String>,
) -> Result<Json<Vec<EventLogEntry>>, ApiError> {
    let events = state.console.trace_events(&trace_id).await?;
    tracing::debug!(%trace_id, events = events.len(), "trace timeline");
    Ok(Json(events))
}

/// GET /admin/v1/jobs/:job_id/events
pub async fn job_events(
    State(state): State<AppState>,
    AdminPath(job_id): AdminPath<String>,
) -> Result<Json<Vec<EventLogEntry>>, ApiError> {
    let events = state.console.job_events(&job_id).await?;
    tracing::debug!(%job_id, events = events.len(), "job timeline");
    Ok(Json(events))
}
