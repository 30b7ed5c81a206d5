//! API Routes Module
//!
//! 모든 HTTP 엔드포인트 정의
//!
//! # Routes
//! - `/admin/v1/health` - 헬스 체크 (인증 없음)
//! - `/admin/v1/overview`, `/admin/v1/funnel` - KPI / 퍼널
//! - `/admin/v1/users/*` - 사용자 검색 및 드릴다운
//! - `/admin/v1/traces/*`, `/admin/v1/jobs/*` - 타임라인
//! - `/admin/v1/errors` - 에러 그룹

pub mod analytics;
pub mod errors;
pub mod health;
pub mod timelines;
pub mod users;

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query},
    http::{header, request::Parts, HeaderName, HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{require_admin, ADMIN_TOKEN_HEADER};
use crate::config::Config;
use crate::error::ApiError;
use crate::types::TimeWindow;
use crate::AppState;

/// 라우터 생성
///
/// # Route Structure
///
/// ```text
/// GET /admin/v1/health                    - 서버 상태 확인
///
/// GET /admin/v1/overview                  - KPI (start, end, segment)
/// GET /admin/v1/funnel                    - 퍼널 (start, end, segment)
///
/// GET /admin/v1/users                     - 사용자 검색
/// GET /admin/v1/users/:user_id            - 사용자 상세
/// GET /admin/v1/users/:user_id/events     - 사용자 이벤트
/// GET /admin/v1/users/:user_id/credits    - 크레딧 원장
/// GET /admin/v1/users/:user_id/iap        - 인앱 결제
///
/// GET /admin/v1/traces/:trace_id/events   - trace 타임라인
/// GET /admin/v1/jobs/:job_id/events       - job 타임라인
///
/// GET /admin/v1/errors                    - 에러 그룹
/// ```
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    let admin = Router::new()
        .route("/overview", get(analytics::overview))
        .route("/funnel", get(analytics::funnel))
        .route("/users", get(users::list_users))
        .route("/users/:user_id", get(users::user_detail))
        .route("/users/:user_id/events", get(users::user_events))
        .route("/users/:user_id/credits", get(users::user_credits))
        .route("/users/:user_id/iap", get(users::user_iap))
        .route("/traces/:trace_id/events", get(timelines::trace_events))
        .route("/jobs/:job_id/events", get(timelines::job_events))
        .route("/errors", get(errors::list_errors))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    let api = Router::new()
        .route("/health", get(health::health_check))
        .merge(admin);

    Router::new()
        .nest("/admin/v1", api)
        // 미들웨어
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // 상태 주입
        .with_state(state)
}

/// CORS 설정
///
/// 프로덕션: `ALLOWED_ORIGINS` 만 허용. 개발: localhost 허용
fn cors_layer(config: &Config) -> CorsLayer {
    let allowed_headers = [
        header::CONTENT_TYPE,
        header::AUTHORIZATION,
        HeaderName::from_static(ADMIN_TOKEN_HEADER),
    ];

    if config.is_production() {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET])
            .allow_headers(allowed_headers)
    } else {
        CorsLayer::new()
            .allow_origin([
                HeaderValue::from_static("http://localhost:5173"), // Vite dev server
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("http://localhost:8501"), // Streamlit
            ])
            .allow_methods(Any)
            .allow_headers(allowed_headers)
    }
}

/// `Query` 와 같지만 파싱 실패를 `ApiError::BadRequest` (JSON) 로 돌려줌
pub struct AdminQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for AdminQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// `Path` 와 같지만 파싱 실패를 `ApiError::BadRequest` (JSON) 로 돌려줌
pub struct AdminPath<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for AdminPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// `start >= end` → 400 "Invalid date range"
pub(crate) fn window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<TimeWindow, ApiError> {
    Ok(TimeWindow::new(start, end)?)
}

/// 빈 문자열 쿼리 파라미터는 생략으로 취급
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
