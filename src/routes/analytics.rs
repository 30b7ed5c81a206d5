//! Overview & Funnel Endpoints

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{window, AdminQuery};
use crate::error::ApiError;
use crate::services::{FunnelStep, OverviewMetrics, Segment};
use crate::AppState;

/// 윈도우 + 세그먼트 쿼리 파라미터
#[derive(Debug, Deserialize)]
pub struct WindowParams {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub segment: Segment,
}

#[derive(Debug, Serialize)]
pub struct OverviewResponse {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub segment: Segment,
    #[serde(flatten)]
    pub metrics: OverviewMetrics,
}

#[derive(Debug, Serialize)]
pub struct FunnelResponse {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub segment: Segment,
    pub steps: Vec<FunnelStep>,
}

/// GET /admin/v1/overview
pub async fn overview(
    State(state): State<AppState>,
    AdminQuery(params): AdminQuery<WindowParams>,
) -> Result<Json<OverviewResponse>, ApiError> {
    let window = window(params.start, params.end)?;
    let metrics = state.console.overview(window, params.segment).await?;

    Ok(Json(OverviewResponse {
        start: window.start,
        end: window.end,
        segment: params.segment,
        metrics,
    }))
}

/// GET /admin/v1/funnel
pub async fn funnel(
    State(state): State<AppState>,
    AdminQuery(params): AdminQuery<WindowParams>,
) -> Result<Json<FunnelResponse>, ApiError> {
    let window = window(params.start, params.end)?;
    let steps = state.console.funnel(window, params.segment).await?;

    Ok(Json(FunnelResponse {
        start: window.start,
        end: window.end,
        segment: params.segment,
        steps,
    }))
}
