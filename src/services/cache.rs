//! Query Memoization
//!
//! 운영자 화면 지연을 줄이기 위한 짧은 TTL 캐시 (moka).
//! 키는 쿼리 인자 튜플 그대로 (window, segment, limit ...).
//! 정확성에는 관여하지 않으며 TTL 0 이면 캐시를 만들지 않고 항상 저장소를 조회한다.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use moka::future::Cache;

pub struct QueryCache<K, V> {
    /// `None` 이면 메모이제이션 비활성화
    inner: Option<Cache<K, V>>,
}

impl<K, V> QueryCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// 쿼리 종류별 최대 엔트리 수
    pub const DEFAULT_CAPACITY: u64 = 256;

    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(ttl: Duration, capacity: u64) -> Self {
        let inner = (!ttl.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(capacity.max(1))
                .time_to_live(ttl)
                .build()
        });

        Self { inner }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        match &self.inner {
            Some(cache) => cache.get(key).await,
            None => None,
        }
    }

    pub async fn insert(&self, key: K, value: V) {
        if let Some(cache) = &self.inner {
            cache.insert(key, value).await;
        }
    }

    /// 캐시 hit 이면 반환, 아니면 `fetch` 실행 후 저장. 에러는 캐시하지 않음
    ///
    /// 같은 키의 동시 miss 는 `fetch` 한 번으로 합쳐짐
    pub async fn get_or_try_insert<F, Fut>(&self, key: K, fetch: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let Some(cache) = &self.inner else {
            return fetch().await;
        };

        cache.try_get_with(key, fetch()).await.map_err(|shared| {
            Arc::try_unwrap(shared).unwrap_or_else(|shared| anyhow!("{shared:#}"))
        })
    }

    /// 대기 중인 만료/축출 작업을 반영한 엔트리 수
    pub async fn len(&self) -> u64 {
        match &self.inner {
            Some(cache) => {
                cache.run_pending_tasks().await;
                cache.entry_count()
            }
            None => 0,
        }
    }
}
