//! Repository Pattern Implementation
//!
//! 분석 쿼리가 필요로 하는 읽기 전용 접근 계약.
//!
//! - PostgreSQL 구현: `db/mod.rs` 의 `Database`
//! - 테스트용 인메모리 구현: `db/memory.rs` 의 `MemoryStore`
//!
//! 집계 로직(전환율, 퍼널 계산)은 서비스 레이어에 있고, 저장소는
//! 세그먼트/윈도우가 적용된 카운트와 목록만 돌려준다.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use super::models::{CreditLedgerEntry, EventLogEntry, IapTransaction, UserSummary};
use crate::services::{ErrorGroup, PayingSet, Segment};
use crate::types::{DateBounds, EventFilter, Page, TimeWindow};

/// 트레이스/잡 타임라인 최대 행 수
pub const TIMELINE_MAX_ROWS: u32 = 1000;

/// Analytics Repository 인터페이스
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    /// 연결 상태 확인
    async fn health_check(&self) -> Result<()>;

    /// 전체 이력 기준 결제 사용자 id
    async fn paying_user_ids(&self) -> Result<PayingSet>;

    /// 윈도우 내 가입 사용자 수
    async fn count_new_users(&self, window: &TimeWindow, segment: Segment) -> Result<i64>;

    /// 윈도우 내 이벤트를 남긴 distinct 사용자 수 (NULL 제외)
    async fn count_active_users(&self, window: &TimeWindow, segment: Segment) -> Result<i64>;

    /// 윈도우 내 이벤트 이름이 `events` 에 속하는 행 수
    async fn count_events(
        &self,
        window: &TimeWindow,
        segment: Segment,
        events: &[&str],
    ) -> Result<i64>;

    /// 이벤트 이름별 distinct 사용자 수. 발생하지 않은 이벤트는 키가 없음
    async fn distinct_users_by_event(
        &self,
        window: &TimeWindow,
        segment: Segment,
        events: &[&str],
    ) -> Result<HashMap<String, i64>>;

    /// `(전체 에러 이벤트 수, 상위 limit 개 그룹)`
    async fn error_groups(&self, window: &TimeWindow, limit: u32)
        -> Result<(i64, Vec<ErrorGroup>)>;

    /// 사용자 검색 (식별자 해시 부분 일치 + 숫자면 id 일치)
    async fn search_users(
        &self,
        segment: Segment,
        query: Option<&str>,
        page: Page,
    ) -> Result<(i64, Vec<UserSummary>)>;

    async fn find_user(&self, user_id: i64) -> Result<Option<UserSummary>>;

    /// 최신순
    async fn user_events(
        &self,
        user_id: i64,
        filter: &EventFilter,
        page: Page,
    ) -> Result<(i64, Vec<EventLogEntry>)>;

    /// 최신순
    async fn user_credits(
        &self,
        user_id: i64,
        bounds: &DateBounds,
        page: Page,
    ) -> Result<(i64, Vec<CreditLedgerEntry>)>;

    /// 최신순
    async fn user_iap(
        &self,
        user_id: i64,
        bounds: &DateBounds,
        page: Page,
    ) -> Result<(i64, Vec<IapTransaction>)>;

    /// 시간순 (오래된 것부터), 최대 `TIMELINE_MAX_ROWS`
    async fn trace_events(&self, trace_id: &str) -> Result<Vec<EventLogEntry>>;

    /// 시간순 (오래된 것부터), 최대 `TIMELINE_MAX_ROWS`
    async fn job_events(&self, job_id: &str) -> Result<Vec<EventLogEntry>>;
}
