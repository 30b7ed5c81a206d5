//! Error Groups Endpoint

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{window, AdminQuery};
use crate::error::ApiError;
use crate::services::ErrorReport;
use crate::types::{Page, OVERVIEW_PAGE};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ErrorsParams {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub limit: Option<u32>,
}

/// GET /admin/v1/errors
///
/// `total` 은 limit 적용 전 에러 이벤트 행 수
pub async fn list_errors(
    State(state): State<AppState>,
    AdminQuery(params): AdminQuery<ErrorsParams>,
) -> Result<Json<ErrorReport>, ApiError> {
    let window = window(params.start, params.end)?;
    let page = Page::new(params.limit, None, OVERVIEW_PAGE)?;

    let report = state.console.errors(window, page.limit).await?;
    Ok(Json(report))
}
