//! In-memory `AnalyticsStore` for tests.
//!
//! Mirrors the SQL in `db/mod.rs` row by row: same segment predicate,
//! same half-open windows, same orderings.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::models::{CreditLedgerEntry, EventLogEntry, IapTransaction, User, UserSummary};
use super::repository::{AnalyticsStore, TIMELINE_MAX_ROWS};
use super::numeric_id;
use crate::services::{group_errors, ErrorGroup, PayingSet, Segment};
use crate::types::{DateBounds, EventFilter, Page, TimeWindow};

#[derive(Debug, Default)]
pub struct MemoryStore {
    pub users: Vec<User>,
    pub ledger: Vec<CreditLedgerEntry>,
    pub purchases: Vec<IapTransaction>,
    pub events: Vec<EventLogEntry>,

    /// true 이면 모든 쿼리가 실패 (저장소 장애 시뮬레이션)
    offline: AtomicBool,

    /// 받은 쿼리 수 (실패 포함)
    queries: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offline() -> Self {
        let store = Self::default();
        store.set_offline(true);
        store
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn ensure_online(&self) -> Result<()> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            bail!("connection refused");
        }
        Ok(())
    }

    fn paying(&self) -> PayingSet {
        PayingSet::from_records(&self.purchases, &self.ledger)
    }

    fn summarize(&self, user: &User, paying: &PayingSet) -> UserSummary {
        UserSummary {
            user: user.clone(),
            paying: paying.contains(user.id),
        }
    }

    fn events_in<'a>(
        &'a self,
        window: &'a TimeWindow,
        segment: Segment,
        paying: &'a PayingSet,
    ) -> impl Iterator<Item = &'a EventLogEntry> + 'a {
        self.events
            .iter()
            .filter(move |e| window.contains(e.created_at) && segment.admits(e.user_id, paying))
    }
}

fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, i64)) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

fn matches_query(user: &User, query: &str) -> bool {
    let needle = query.to_lowercase();
    let contains = |field: &Option<String>| {
        field
            .as_deref()
            .is_some_and(|value| value.to_lowercase().contains(&needle))
    };

    contains(&user.install_id_hash)
        || contains(&user.google_sub)
        || numeric_id(query).is_some_and(|id| id == user.id)
}

#[async_trait]
impl AnalyticsStore for MemoryStore {
    async fn health_check(&self) -> Result<()> {
        self.ensure_online()
    }

    async fn paying_user_ids(&self) -> Result<PayingSet> {
        self.ensure_online()?;
        Ok(self.paying())
    }

    async fn count_new_users(&self, window: &TimeWindow, segment: Segment) -> Result<i64> {
        self.ensure_online()?;
        let paying = self.paying();
        let count = self
            .users
            .iter()
            .filter(|u| window.contains(u.created_at) && segment.admits(Some(u.id), &paying))
            .count();
        Ok(count as i64)
    }

    async fn count_active_users(&self, window: &TimeWindow, segment: Segment) -> Result<i64> {
        self.ensure_online()?;
        let paying = self.paying();
        let users: BTreeSet<i64> = self
            .events_in(window, segment, &paying)
            .filter_map(|e| e.user_id)
            .collect();
        Ok(users.len() as i64)
    }

    async fn count_events(
        &self,
        window: &TimeWindow,
        segment: Segment,
        events: &[&str],
    ) -> Result<i64> {
        self.ensure_online()?;
        let paying = self.paying();
        let count = self
            .events_in(window, segment, &paying)
            .filter(|e| events.contains(&e.event.as_str()))
            .count();
        Ok(count as i64)
    }

    async fn distinct_users_by_event(
        &self,
        window: &TimeWindow,
        segment: Segment,
        events: &[&str],
    ) -> Result<HashMap<String, i64>> {
        self.ensure_online()?;
        let paying = self.paying();

        let mut users: HashMap<String, BTreeSet<i64>> = HashMap::new();
        for entry in self
            .events_in(window, segment, &paying)
            .filter(|e| events.contains(&e.event.as_str()))
        {
            if let Some(user_id) = entry.user_id {
                users.entry(entry.event.clone()).or_default().insert(user_id);
            }
        }

        Ok(users
            .into_iter()
            .map(|(event, ids)| (event, ids.len() as i64))
            .collect())
    }

    async fn error_groups(
        &self,
        window: &TimeWindow,
        limit: u32,
    ) -> Result<(i64, Vec<ErrorGroup>)> {
        self.ensure_online()?;
        Ok(group_errors(
            self.events.iter().filter(|e| window.contains(e.created_at)),
            limit,
        ))
    }

    async fn search_users(
        &self,
        segment: Segment,
        query: Option<&str>,
        page: Page,
    ) -> Result<(i64, Vec<UserSummary>)> {
        self.ensure_online()?;
        let paying = self.paying();

        let mut matched: Vec<&User> = self
            .users
            .iter()
            .filter(|u| segment.admits(Some(u.id), &paying))
            .filter(|u| query.map_or(true, |q| matches_query(u, q)))
            .collect();
        newest_first(&mut matched, |u| (u.created_at, u.id));

        let total = matched.len() as i64;
        let items = page
            .apply(matched)
            .into_iter()
            .map(|u| self.summarize(u, &paying))
            .collect();
        Ok((total, items))
    }

    async fn find_user(&self, user_id: i64) -> Result<Option<UserSummary>> {
        self.ensure_online()?;
        let paying = self.paying();
        Ok(self
            .users
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| self.summarize(u, &paying)))
    }

    async fn user_events(
        &self,
        user_id: i64,
        filter: &EventFilter,
        page: Page,
    ) -> Result<(i64, Vec<EventLogEntry>)> {
        self.ensure_online()?;
        let mut matched: Vec<EventLogEntry> = self
            .events
            .iter()
            .filter(|e| e.user_id == Some(user_id) && filter.bounds.contains(e.created_at))
            .filter(|e| filter.trace_id.is_none() || e.trace_id == filter.trace_id)
            .filter(|e| filter.job_id.is_none() || e.job_id == filter.job_id)
            .cloned()
            .collect();
        newest_first(&mut matched, |e| (e.created_at, e.id));

        Ok((matched.len() as i64, page.apply(matched)))
    }

    async fn user_credits(
        &self,
        user_id: i64,
        bounds: &DateBounds,
        page: Page,
    ) -> Result<(i64, Vec<CreditLedgerEntry>)> {
        self.ensure_online()?;
        let mut matched: Vec<CreditLedgerEntry> = self
            .ledger
            .iter()
            .filter(|c| c.user_id == user_id && bounds.contains(c.created_at))
            .cloned()
            .collect();
        newest_first(&mut matched, |c| (c.created_at, c.id));

        Ok((matched.len() as i64, page.apply(matched)))
    }

    async fn user_iap(
        &self,
        user_id: i64,
        bounds: &DateBounds,
        page: Page,
    ) -> Result<(i64, Vec<IapTransaction>)> {
        self.ensure_online()?;
        let mut matched: Vec<IapTransaction> = self
            .purchases
            .iter()
            .filter(|t| t.user_id == user_id && bounds.contains(t.created_at))
            .cloned()
            .collect();
        newest_first(&mut matched, |t| (t.created_at, t.id));

        Ok((matched.len() as i64, page.apply(matched)))
    }

    async fn trace_events(&self, trace_id: &str) -> Result<Vec<EventLogEntry>> {
        self.ensure_online()?;
        Ok(self.timeline(|e| e.trace_id.as_deref() == Some(trace_id)))
    }

    async fn job_events(&self, job_id: &str) -> Result<Vec<EventLogEntry>> {
        self.ensure_online()?;
        Ok(self.timeline(|e| e.job_id.as_deref() == Some(job_id)))
    }
}

impl MemoryStore {
    fn timeline(&self, pred: impl Fn(&EventLogEntry) -> bool) -> Vec<EventLogEntry> {
        let mut matched: Vec<EventLogEntry> = self.events.iter().filter(|&e| pred(e)).cloned().collect();
        matched.sort_by_key(|e| (e.created_at, e.id));
        matched.truncate(TIMELINE_MAX_ROWS as usize);
        matched
    }
}

/// 테스트 레코드 생성 헬퍼
pub mod fixtures {
    use chrono::{DateTime, Utc};
    use serde_json::Value;

    use crate::db::{CreditLedgerEntry, EventLogEntry, IapTransaction, User};

    pub fn ts(s: &str) -> DateTime<Utc> {
        s.parse().expect("valid RFC 3339 timestamp")
    }

    pub fn user(id: i64, created_at: &str) -> User {
        User {
            id,
            created_at: ts(created_at),
            install_id_hash: Some(format!("install-{id}")),
            google_sub: None,
            credits_balance: 0,
            merged_into_user_id: None,
            last_seen_at: None,
        }
    }

    pub fn purchase(id: i64, user_id: i64, status: &str, created_at: &str) -> IapTransaction {
        IapTransaction {
            id,
            user_id,
            store: "google_play".into(),
            product_id: Some("credits_100".into()),
            purchase_token: Some(format!("token-{id}")),
            status: status.into(),
            raw_payload: None,
            created_at: ts(created_at),
            verified_at: (status == "verified").then(|| ts(created_at)),
        }
    }

    pub fn ledger(id: i64, user_id: i64, kind: &str, delta: i32, created_at: &str) -> CreditLedgerEntry {
        CreditLedgerEntry {
            id,
            user_id,
            kind: kind.into(),
            delta,
            ref_type: None,
            ref_id: None,
            created_at: ts(created_at),
        }
    }

    pub fn event(id: i64, created_at: &str, user_id: Option<i64>, name: &str) -> EventLogEntry {
        EventLogEntry {
            id,
            created_at: ts(created_at),
            trace_id: None,
            user_id,
            job_id: None,
            event: name.into(),
            payload: None,
        }
    }

    pub fn error_event(
        id: i64,
        created_at: &str,
        name: &str,
        payload: Option<Value>,
        trace_id: Option<&str>,
    ) -> EventLogEntry {
        EventLogEntry {
            trace_id: trace_id.map(str::to_string),
            payload,
            ..event(id, created_at, None, name)
        }
    }
}
