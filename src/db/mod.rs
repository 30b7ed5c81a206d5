//! Database Module
//!
//! # Interview Q&A
//!
//! Q: 집계를 SQL 에서 할까, 애플리케이션에서 할까?
//! A: 카운트/그룹핑은 SQL 에서
//!    - event_log 는 append-only 로 계속 커짐 → 행을 끌어오면 안 됨
//!    - COUNT(DISTINCT), GROUP BY, JSONB `->>` 투영 모두 Postgres 가 처리
//!    - 애플리케이션은 전환율/퍼널 같은 작은 산술만 담당 (`services`)
//!
//! Q: 동적 WHERE 절은 어떻게 안전하게 만드는가?
//! A: `sqlx::QueryBuilder` + `push_bind`
//!    - 사용자 입력은 전부 바인드 파라미터
//!    - 문자열로 붙는 것은 상수 SQL 조각뿐 (세그먼트 서브쿼리, 컬럼명)
//!
//! Q: 커넥션은 어떻게 관리하는가?
//! A: SQLx 의 PgPool
//!    - 쿼리마다 풀에서 획득, 성공/실패와 무관하게 반환
//!    - 읽기 전용 쿼리뿐이라 요청 간 락/조율 없음
//!    - 여러 카운트는 같은 스냅샷이 아님 (동시 쓰기 시 약간 어긋날 수 있음, 허용)

#[cfg(test)]
pub mod memory;
mod models;
mod repository;

pub use models::*;
pub use repository::{AnalyticsStore, TIMELINE_MAX_ROWS};

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, QueryBuilder};

use crate::services::{ErrorGroup, PayingSet, Segment, PAYING_USER_IDS_SQL};
use crate::types::{DateBounds, EventFilter, Page, TimeWindow};

const USER_SUMMARY_SELECT: &str = "SELECT u.id, u.created_at, u.install_id_hash, u.google_sub, \
     u.credits_balance, u.merged_into_user_id, u.last_seen_at";

const EVENT_COLUMNS: &str = "id, created_at, trace_id, user_id, job_id, event, payload";

const LEDGER_COLUMNS: &str = "id, user_id, type, delta, ref_type, ref_id, created_at";

const IAP_COLUMNS: &str = "id, user_id, store, product_id, purchase_token, status, \
     raw_payload, created_at, verified_at";

/// 에러 이벤트 판별 조건 (`services::errors::is_error_event` 와 동일)
const ERROR_EVENT_PREDICATE: &str = "(event ILIKE '%failed%' \
     OR payload->>'error_type' IS NOT NULL \
     OR payload->>'error_message' IS NOT NULL)";

const ERROR_GROUP_SELECT: &str = "SELECT event, \
     payload->>'error_type' AS error_type, \
     payload->>'error_message' AS error_message, \
     COUNT(*) AS count, \
     MIN(trace_id COLLATE \"C\") AS sample_trace_id, \
     MIN(job_id COLLATE \"C\") AS sample_job_id \
     FROM event_log WHERE ";

/// 그룹 키 + 결정적 정렬 (count 내림차순, 키 오름차순, NULL 먼저)
const ERROR_GROUP_ORDER: &str = " GROUP BY event, payload->>'error_type', payload->>'error_message' \
     ORDER BY count DESC, \
     event COLLATE \"C\" ASC, \
     payload->>'error_type' COLLATE \"C\" ASC NULLS FIRST, \
     payload->>'error_message' COLLATE \"C\" ASC NULLS FIRST \
     LIMIT ";

/// 데이터베이스 연결 및 분석 쿼리 담당
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 데이터베이스 연결
    ///
    /// # Connection Pool Settings
    ///
    /// - max_connections: 설정값 (기본 10)
    /// - min_connections: 1 (idle 시 최소 유지)
    /// - acquire_timeout: 3초 (커넥션 획득 대기)
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .acquire_timeout(std::time::Duration::from_secs(3))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl AnalyticsStore for Database {
    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn paying_user_ids(&self) -> Result<PayingSet> {
        let ids: Vec<i64> = sqlx::query_scalar(PAYING_USER_IDS_SQL)
            .fetch_all(&self.pool)
            .await?;

        Ok(ids.into_iter().collect())
    }

    async fn count_new_users(&self, window: &TimeWindow, segment: Segment) -> Result<i64> {
        let count: i64 = new_users_query(window, segment)
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_active_users(&self, window: &TimeWindow, segment: Segment) -> Result<i64> {
        let count: i64 = active_users_query(window, segment)
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_events(
        &self,
        window: &TimeWindow,
        segment: Segment,
        events: &[&str],
    ) -> Result<i64> {
        let count: i64 = event_count_query(window, segment, events)
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn distinct_users_by_event(
        &self,
        window: &TimeWindow,
        segment: Segment,
        events: &[&str],
    ) -> Result<HashMap<String, i64>> {
        let rows: Vec<(String, i64)> = distinct_users_query(window, segment, events)
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().collect())
    }

    async fn error_groups(
        &self,
        window: &TimeWindow,
        limit: u32,
    ) -> Result<(i64, Vec<ErrorGroup>)> {
        let groups: Vec<ErrorGroup> = error_groups_query(window, limit)
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;

        let total: i64 = error_total_query(window)
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        Ok((total, groups))
    }

    async fn search_users(
        &self,
        segment: Segment,
        query: Option<&str>,
        page: Page,
    ) -> Result<(i64, Vec<UserSummary>)> {
        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users u WHERE TRUE");
        push_user_search(&mut count_qb, segment, query);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(USER_SUMMARY_SELECT);
        qb.push(", (u.id IN (")
            .push(PAYING_USER_IDS_SQL)
            .push(")) AS paying FROM users u WHERE TRUE");
        push_user_search(&mut qb, segment, query);
        qb.push(" ORDER BY u.created_at DESC, u.id DESC");
        push_page(&mut qb, page);

        let items: Vec<UserSummary> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok((total, items))
    }

    async fn find_user(&self, user_id: i64) -> Result<Option<UserSummary>> {
        let sql = format!(
            "{USER_SUMMARY_SELECT}, (u.id IN ({PAYING_USER_IDS_SQL})) AS paying \
             FROM users u WHERE u.id = $1"
        );

        let user = sqlx::query_as::<_, UserSummary>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn user_events(
        &self,
        user_id: i64,
        filter: &EventFilter,
        page: Page,
    ) -> Result<(i64, Vec<EventLogEntry>)> {
        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM event_log");
        push_event_filter(&mut count_qb, user_id, filter);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {EVENT_COLUMNS} FROM event_log"));
        push_event_filter(&mut qb, user_id, filter);
        qb.push(" ORDER BY created_at DESC, id DESC");
        push_page(&mut qb, page);

        let items: Vec<EventLogEntry> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok((total, items))
    }

    async fn user_credits(
        &self,
        user_id: i64,
        bounds: &DateBounds,
        page: Page,
    ) -> Result<(i64, Vec<CreditLedgerEntry>)> {
        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM credit_ledger WHERE user_id = ");
        count_qb.push_bind(user_id);
        push_bounds(&mut count_qb, "created_at", bounds);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {LEDGER_COLUMNS} FROM credit_ledger WHERE user_id = "
        ));
        qb.push_bind(user_id);
        push_bounds(&mut qb, "created_at", bounds);
        qb.push(" ORDER BY created_at DESC, id DESC");
        push_page(&mut qb, page);

        let items: Vec<CreditLedgerEntry> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok((total, items))
    }

    async fn user_iap(
        &self,
        user_id: i64,
        bounds: &DateBounds,
        page: Page,
    ) -> Result<(i64, Vec<IapTransaction>)> {
        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM iap_transactions WHERE user_id = ");
        count_qb.push_bind(user_id);
        push_bounds(&mut count_qb, "created_at", bounds);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {IAP_COLUMNS} FROM iap_transactions WHERE user_id = "
        ));
        qb.push_bind(user_id);
        push_bounds(&mut qb, "created_at", bounds);
        qb.push(" ORDER BY created_at DESC, id DESC");
        push_page(&mut qb, page);

        let items: Vec<IapTransaction> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok((total, items))
    }

    async fn trace_events(&self, trace_id: &str) -> Result<Vec<EventLogEntry>> {
        self.timeline("trace_id", trace_id).await
    }

    async fn job_events(&self, job_id: &str) -> Result<Vec<EventLogEntry>> {
        self.timeline("job_id", job_id).await
    }
}

impl Database {
    /// 상관관계 id 로 묶인 이벤트를 시간순으로
    async fn timeline(&self, column: &str, value: &str) -> Result<Vec<EventLogEntry>> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM event_log WHERE {column} = $1 \
             ORDER BY created_at ASC, id ASC LIMIT $2"
        );

        let events = sqlx::query_as::<_, EventLogEntry>(&sql)
            .bind(value)
            .bind(i64::from(TIMELINE_MAX_ROWS))
            .fetch_all(&self.pool)
            .await?;

        Ok(events)
    }
}

// ============ SQL Builders ============

fn new_users_query(window: &TimeWindow, segment: Segment) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM users WHERE TRUE");
    push_window(&mut qb, "users.created_at", window);
    push_segment(&mut qb, segment, "users.id");
    qb
}

fn active_users_query(window: &TimeWindow, segment: Segment) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(
        "SELECT COUNT(DISTINCT user_id) FROM event_log WHERE user_id IS NOT NULL",
    );
    push_window(&mut qb, "event_log.created_at", window);
    push_segment(&mut qb, segment, "event_log.user_id");
    qb
}

fn event_count_query(
    window: &TimeWindow,
    segment: Segment,
    events: &[&str],
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM event_log WHERE event = ANY(");
    qb.push_bind(owned(events)).push(")");
    push_window(&mut qb, "event_log.created_at", window);
    push_segment(&mut qb, segment, "event_log.user_id");
    qb
}

fn distinct_users_query(
    window: &TimeWindow,
    segment: Segment,
    events: &[&str],
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(
        "SELECT event, COUNT(DISTINCT user_id) FROM event_log \
         WHERE user_id IS NOT NULL AND event = ANY(",
    );
    qb.push_bind(owned(events)).push(")");
    push_window(&mut qb, "event_log.created_at", window);
    push_segment(&mut qb, segment, "event_log.user_id");
    qb.push(" GROUP BY event");
    qb
}

fn error_groups_query(window: &TimeWindow, limit: u32) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(ERROR_GROUP_SELECT);
    qb.push(ERROR_EVENT_PREDICATE);
    push_window(&mut qb, "event_log.created_at", window);
    qb.push(ERROR_GROUP_ORDER);
    qb.push_bind(i64::from(limit));
    qb
}

/// limit 없는 전체 에러 행 수 (그룹 쿼리와 같은 조건)
fn error_total_query(window: &TimeWindow) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM event_log WHERE ");
    qb.push(ERROR_EVENT_PREDICATE);
    push_window(&mut qb, "event_log.created_at", window);
    qb
}

fn owned(events: &[&str]) -> Vec<String> {
    events.iter().map(|e| e.to_string()).collect()
}

fn push_window(qb: &mut QueryBuilder<'_, Postgres>, column: &str, window: &TimeWindow) {
    qb.push(" AND ").push(column).push(" >= ").push_bind(window.start);
    qb.push(" AND ").push(column).push(" < ").push_bind(window.end);
}

fn push_bounds(qb: &mut QueryBuilder<'_, Postgres>, column: &str, bounds: &DateBounds) {
    if let Some(start) = bounds.start {
        qb.push(" AND ").push(column).push(" >= ").push_bind(start);
    }
    if let Some(end) = bounds.end {
        qb.push(" AND ").push(column).push(" < ").push_bind(end);
    }
}

fn push_segment(qb: &mut QueryBuilder<'_, Postgres>, segment: Segment, column: &str) {
    if let Some(clause) = segment.sql_clause(column) {
        qb.push(" AND ").push(clause);
    }
}

fn push_page(qb: &mut QueryBuilder<'_, Postgres>, page: Page) {
    qb.push(" LIMIT ").push_bind(i64::from(page.limit));
    qb.push(" OFFSET ").push_bind(i64::from(page.offset));
}

fn push_user_search(qb: &mut QueryBuilder<'_, Postgres>, segment: Segment, query: Option<&str>) {
    push_segment(qb, segment, "u.id");

    let Some(query) = query else {
        return;
    };

    let pattern = ilike_pattern(query);
    qb.push(" AND (u.install_id_hash ILIKE ").push_bind(pattern.clone());
    qb.push(" OR u.google_sub ILIKE ").push_bind(pattern);
    if let Some(id) = numeric_id(query) {
        qb.push(" OR u.id = ").push_bind(id);
    }
    qb.push(")");
}

fn push_event_filter(qb: &mut QueryBuilder<'_, Postgres>, user_id: i64, filter: &EventFilter) {
    qb.push(" WHERE user_id = ").push_bind(user_id);
    push_bounds(qb, "created_at", &filter.bounds);
    if let Some(trace_id) = &filter.trace_id {
        qb.push(" AND trace_id = ").push_bind(trace_id.clone());
    }
    if let Some(job_id) = &filter.job_id {
        qb.push(" AND job_id = ").push_bind(job_id.clone());
    }
}

/// 부분 일치 ILIKE 패턴. 입력의 `%`, `_`, `\` 는 리터럴로 취급
pub(crate) fn ilike_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// 검색어가 전부 ASCII 숫자이고 i64 범위면 id 로도 매칭
pub(crate) fn numeric_id(query: &str) -> Option<i64> {
    if query.is_empty() || !query.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    query.parse().ok()
}
