//! Common Types Module
//!
//! 애플리케이션 전반에서 사용되는 공통 타입 정의
//! (조회 윈도우, 페이지네이션, 타임라인 필터)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 요청 파라미터 검증 실패
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// `start >= end`
    #[error("Invalid date range")]
    InvalidDateRange,

    #[error("limit must be between 1 and {max}")]
    LimitOutOfRange { max: u32 },
}

/// 반개구간 `[start, end)` UTC 조회 윈도우
///
/// 생성 시점에 `start < end` 를 검증하므로, 이 타입을 받는 쿼리는
/// 윈도우가 유효하다고 가정할 수 있음
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, QueryError> {
        if start >= end {
            return Err(QueryError::InvalidDateRange);
        }
        Ok(Self { start, end })
    }

    /// `start <= ts < end`
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}

/// 드릴다운 조회용 선택적 기간 (양쪽 모두 생략 가능)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
pub struct DateBounds {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateBounds {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| ts >= start) && self.end.map_or(true, |end| ts < end)
    }
}

/// 사용자 이벤트 조회 필터
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub bounds: DateBounds,
    pub trace_id: Option<String>,
    pub job_id: Option<String>,
}

/// 페이지 크기 기본값/최대값
#[derive(Debug, Clone, Copy)]
pub struct PageBounds {
    pub default_limit: u32,
    pub max_limit: u32,
}

/// 사용자 목록, 에러 그룹 등 overview 규모 목록
pub const OVERVIEW_PAGE: PageBounds = PageBounds {
    default_limit: 50,
    max_limit: 200,
};

/// 이벤트/원장 목록
pub const EVENT_PAGE: PageBounds = PageBounds {
    default_limit: 200,
    max_limit: 1000,
};

/// 검증된 페이지 요청
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    /// limit 은 `1..=max_limit`, offset 은 0 이상
    pub fn new(limit: Option<u32>, offset: Option<u32>, bounds: PageBounds) -> Result<Self, QueryError> {
        let limit = limit.unwrap_or(bounds.default_limit);
        if limit == 0 || limit > bounds.max_limit {
            return Err(QueryError::LimitOutOfRange {
                max: bounds.max_limit,
            });
        }

        Ok(Self {
            limit,
            offset: offset.unwrap_or(0),
        })
    }

    /// 인메모리 슬라이스 적용
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .collect()
    }
}

/// `(total, page)` 응답
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    /// 페이지 적용 전 전체 건수
    pub total: i64,
    pub items: Vec<T>,
}
