//! Services Module
//!
//! 분석 쿼리 로직을 담당하는 서비스 레이어
//!
//! # Services
//! - `segment`: 결제/비결제 사용자 분류
//! - `metrics`: Overview KPI 집계
//! - `funnel`: 생성 파이프라인 퍼널
//! - `errors`: 에러 이벤트 그룹핑
//! - `cache`: 짧은 TTL 쿼리 메모이제이션
//! - `Console`: 라우트가 사용하는 단일 진입점

mod cache;
mod console;
mod errors;
mod funnel;
mod metrics;
mod segment;

pub use cache::QueryCache;
pub use console::Console;
pub use errors::{group_errors, is_error_event, ErrorGroup, ErrorReport};
pub use funnel::{build_steps, FunnelStep, FUNNEL_STEPS};
pub use metrics::{
    aggregate, conversion_to_pay, OverviewMetrics, JOB_FAILED_EVENTS, JOB_STARTED_EVENTS,
    JOB_SUCCEEDED_EVENTS,
};
pub use segment::{is_paid_topup, is_verified_purchase, PayingSet, Segment, PAYING_USER_IDS_SQL};
