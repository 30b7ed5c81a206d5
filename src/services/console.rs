//! Analytics Console Service
//!
//! Entry point for every admin query. Holds the store and the optional
//! memoization layer; no other state.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use super::cache::QueryCache;
use super::errors::ErrorReport;
use super::funnel::{build_steps, FunnelStep, FUNNEL_STEPS};
use super::metrics::{self, OverviewMetrics};
use super::segment::{PayingSet, Segment};
use crate::db::{AnalyticsStore, CreditLedgerEntry, EventLogEntry, IapTransaction, UserSummary};
use crate::types::{DateBounds, EventFilter, Page, Paginated, TimeWindow};

/// 분석 콘솔 서비스
pub struct Console {
    store: Arc<dyn AnalyticsStore>,
    overview_cache: QueryCache<(TimeWindow, Segment), OverviewMetrics>,
    funnel_cache: QueryCache<(TimeWindow, Segment), Vec<FunnelStep>>,
    error_cache: QueryCache<(TimeWindow, u32), ErrorReport>,
}

impl Console {
    /// `cache_ttl` 이 0 이면 메모이제이션 비활성화
    pub fn new(store: Arc<dyn AnalyticsStore>, cache_ttl: Duration) -> Self {
        Self {
            store,
            overview_cache: QueryCache::new(cache_ttl),
            funnel_cache: QueryCache::new(cache_ttl),
            error_cache: QueryCache::new(cache_ttl),
        }
    }

    pub async fn health_check(&self) -> Result<()> {
        self.store.health_check().await
    }

    /// 전체 이력 기준 결제 사용자 집합
    pub async fn paying_user_ids(&self) -> Result<PayingSet> {
        self.store.paying_user_ids().await
    }

    pub async fn overview(&self, window: TimeWindow, segment: Segment) -> Result<OverviewMetrics> {
        let store = self.store.as_ref();
        let result = self
            .overview_cache
            .get_or_try_insert((window, segment), || metrics::aggregate(store, &window, segment))
            .await?;

        tracing::debug!(
            %segment,
            new_users = result.new_users,
            active_users = result.active_users,
            "overview computed"
        );
        Ok(result)
    }

    pub async fn funnel(&self, window: TimeWindow, segment: Segment) -> Result<Vec<FunnelStep>> {
        let store = self.store.as_ref();
        self.funnel_cache
            .get_or_try_insert((window, segment), || async move {
                let counts = store
                    .distinct_users_by_event(&window, segment, &FUNNEL_STEPS)
                    .await?;
                Ok(build_steps(&FUNNEL_STEPS, &counts))
            })
            .await
    }

    pub async fn errors(&self, window: TimeWindow, limit: u32) -> Result<ErrorReport> {
        let store = self.store.as_ref();
        let report = self
            .error_cache
            .get_or_try_insert((window, limit), || async move {
                let (total, items) = store.error_groups(&window, limit).await?;
                Ok(ErrorReport { total, items })
            })
            .await?;

        tracing::debug!(total = report.total, groups = report.items.len(), "errors grouped");
        Ok(report)
    }

    /// 빈 검색어(공백만 포함)는 검색 조건 없음으로 취급
    pub async fn users(
        &self,
        segment: Segment,
        query: Option<&str>,
        page: Page,
    ) -> Result<Paginated<UserSummary>> {
        let query = query.map(str::trim).filter(|q| !q.is_empty());
        let (total, items) = self.store.search_users(segment, query, page).await?;
        Ok(Paginated { total, items })
    }

    /// 없으면 `None` (에러 아님)
    pub async fn user_detail(&self, user_id: i64) -> Result<Option<UserSummary>> {
        self.store.find_user(user_id).await
    }

    pub async fn user_events(
        &self,
        user_id: i64,
        filter: &EventFilter,
        page: Page,
    ) -> Result<Paginated<EventLogEntry>> {
        let (total, items) = self.store.user_events(user_id, filter, page).await?;
        Ok(Paginated { total, items })
    }

    pub async fn user_credits(
        &self,
        user_id: i64,
        bounds: &DateBounds,
        page: Page,
    ) -> Result<Paginated<CreditLedgerEntry>> {
        let (total, items) = self.store.user_credits(user_id, bounds, page).await?;
        Ok(Paginated { total, items })
    }

    pub async fn user_iap(
        &self,
        user_id: i64,
        bounds: &DateBounds,
        page: Page,
    ) -> Result<Paginated<IapTransaction>> {
        let (total, items) = self.store.user_iap(user_id, bounds, page).await?;
        Ok(Paginated { total, items })
    }

    pub async fn trace_events(&self, trace_id: &str) -> Result<Vec<EventLogEntry>> {
        self.store.trace_events(trace_id).await
    }

    pub async fn job_events(&self, job_id: &str) -> Result<Vec<EventLogEntry>> {
        self.store.job_events(job_id).await
    }
}
