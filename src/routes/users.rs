//! User Explorer Endpoints
//!
//! 검색 목록과 사용자 단위 드릴다운 (이벤트 / 크레딧 원장 / 인앱 결제).
//! 드릴다운 목록은 모두 최신순.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{non_empty, AdminPath, AdminQuery};
use crate::db::{CreditLedgerEntry, EventLogEntry, IapTransaction, UserSummary};
use crate::error::ApiError;
use crate::services::Segment;
use crate::types::{DateBounds, EventFilter, Page, Paginated, EVENT_PAGE, OVERVIEW_PAGE};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UsersParams {
    pub query: Option<String>,
    #[serde(default)]
    pub segment: Segment,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct UserEventsParams {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub trace_id: Option<String>,
    pub job_id: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// 크레딧 / 인앱 결제 목록 파라미터
#[derive(Debug, Deserialize)]
pub struct LedgerParams {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl LedgerParams {
    fn bounds(&self) -> DateBounds {
        DateBounds {
            start: self.start,
            end: self.end,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserDetail {
    pub user: UserSummary,
}

/// GET /admin/v1/users
pub async fn list_users(
    State(state): State<AppState>,
    AdminQuery(params): AdminQuery<UsersParams>,
) -> Result<Json<Paginated<UserSummary>>, ApiError> {
    let page = Page::new(params.limit, params.offset, OVERVIEW_PAGE)?;
    let users = state
        .console
        .users(params.segment, params.query.as_deref(), page)
        .await?;
    Ok(Json(users))
}

/// GET /admin/v1/users/:user_id
pub async fn user_detail(
    State(state): State<AppState>,
    AdminPath(user_id): AdminPath<i64>,
) -> Result<Json<UserDetail>, ApiError> {
    let user = state
        .console
        .user_detail(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User".to_string()))?;
    Ok(Json(UserDetail { user }))
}

/// GET /admin/v1/users/:user_id/events
pub async fn user_events(
    State(state): State<AppState>,
    AdminPath(user_id): AdminPath<i64>,
    AdminQuery(params): AdminQuery<UserEventsParams>,
) -> Result<Json<Paginated<EventLogEntry>>, ApiError> {
    let page = Page::new(params.limit, params.offset, EVENT_PAGE)?;
    let filter = EventFilter {
        bounds: DateBounds {
            start: params.start,
            end: params.end,
        },
        trace_id: non_empty(params.trace_id),
        job_id: non_empty(params.job_id),
    };

    let events = state.console.user_events(user_id, &filter, page).await?;
    Ok(Json(events))
}

/// GET /admin/v1/users/:user_id/credits
pub async fn user_credits(
    State(state): State<AppState>,
    AdminPath(user_id): AdminPath<i64>,
    AdminQuery(params): AdminQuery<LedgerParams>,
) -> Result<Json<Paginated<CreditLedgerEntry>>, ApiError> {
    let page = Page::new(params.limit, params.offset, EVENT_PAGE)?;
    let entries = state.console.user_credits(user_id, &params.bounds(), page).await?;
    Ok(Json(entries))
}

/// GET /admin/v1/users/:user_id/iap
pub async fn user_iap(
    State(state): State<AppState>,
    AdminPath(user_id): AdminPath<i64>,
    AdminQuery(params): AdminQuery<LedgerParams>,
) -> Result<Json<Paginated<IapTransaction>>, ApiError> {
    let page = Page::new(params.limit, params.offset, EVENT_PAGE)?;
    let purchases = state.console.user_iap(user_id, &params.bounds(), page).await?;
    Ok(Json(purchases))
}
