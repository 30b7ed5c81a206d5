//! Admin Console API Library
//!
//! # Overview
//!
//! 사용자 / 크레딧 원장 / 인앱 결제 / 이벤트 로그를 읽기 전용으로 조회하는
//! 운영자용 분석 & 디버깅 백엔드.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      /admin/v1 API                        │
//! │                                                           │
//! │  ┌─────────┐  ┌──────────────────────┐  ┌─────────┐      │
//! │  │ Routes  │─▶│ Console (services)    │─▶│   DB    │      │
//! │  │ + auth  │  │ segment · metrics     │  │ (trait) │      │
//! │  └─────────┘  │ funnel · errors       │  └────┬────┘      │
//! │               │ cache                 │       │           │
//! │               └──────────────────────┘       │           │
//! └───────────────────────────────────────────────┼───────────┘
//!                                                 ▼
//!                                        ┌────────────────┐
//!                                        │   PostgreSQL   │
//!                                        └────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `config`: 환경 설정 관리
//! - `error`: 에러 타입 및 HTTP 매핑
//! - `auth`: 관리자 인증 미들웨어
//! - `routes`: HTTP 엔드포인트 핸들러
//! - `services`: 세그먼트 / 메트릭 / 퍼널 / 에러 그룹핑
//! - `db`: 엔티티 저장소 (PostgreSQL)
//! - `types`: 조회 윈도우, 페이지네이션
//!
//! ## Usage
//!
//! ```rust,ignore
//! use admin_console_api::{config::Config, db::Database, AppState};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let db = Database::connect(&config.database_url, config.db_max_connections).await?;
//!     let state = AppState::new(Arc::new(db), config);
//!     let app = admin_console_api::routes::create_router(state);
//!     // ... 서버 시작
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod services;
pub mod types;

// Re-exports for convenience
pub use auth::AdminCredentials;
pub use config::Config;
pub use db::{AnalyticsStore, Database};
pub use error::ApiError;
pub use services::{Console, Segment};

/// 애플리케이션 전역 상태
#[derive(Clone)]
pub struct AppState {
    pub console: Arc<Console>,
    pub credentials: Arc<AdminCredentials>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn AnalyticsStore>, config: Config) -> Self {
        Self {
            console: Arc::new(Console::new(store, config.query_cache_ttl)),
            credentials: Arc::new(AdminCredentials::from_config(&config)),
            config: Arc::new(config),
        }
    }
}
