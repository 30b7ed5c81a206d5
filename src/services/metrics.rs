//! Metrics Aggregator
//!
//! Point-in-time KPI counts for a `[start, end)` window and a segment.
//! Each count is an independent query; they are not taken from one snapshot.

use anyhow::Result;
use serde::Serialize;

use super::segment::Segment;
use crate::db::AnalyticsStore;
use crate::types::TimeWindow;

pub const JOB_STARTED_EVENTS: [&str; 2] = ["generate_requested", "upload_started"];
pub const JOB_SUCCEEDED_EVENTS: [&str; 2] = ["job_succeeded", "image_generation_success"];
pub const JOB_FAILED_EVENTS: [&str; 3] = ["job_failed", "image_generation_failed", "llm_generation_failed"];

/// Overview KPI
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OverviewMetrics {
    pub new_users: i64,
    pub active_users: i64,
    pub jobs_started: i64,
    pub jobs_succeeded: i64,
    pub jobs_failed: i64,
    pub conversion_to_pay: f64,
}

/// 결제 전환율
///
/// 세그먼트별 비율이 아니라 "전체 활성 사용자 중 결제 사용자 비율" 을
/// 요청 세그먼트로 게이팅한 값:
/// - 활성 0 → 0.0
/// - `paying` → 1.0, `non_paying` → 0.0
/// - `all` → paying_active / active
pub fn conversion_to_pay(segment: Segment, active_users: i64, paying_active_users: i64) -> f64 {
    if active_users == 0 {
        return 0.0;
    }

    match segment {
        Segment::All => paying_active_users as f64 / active_users as f64,
        Segment::Paying => 1.0,
        Segment::NonPaying => 0.0,
    }
}

pub async fn aggregate(
    store: &dyn AnalyticsStore,
    window: &TimeWindow,
    segment: Segment,
) -> Result<OverviewMetrics> {
    let new_users = store.count_new_users(window, segment).await?;
    let active_users = store.count_active_users(window, segment).await?;
    let jobs_started = store.count_events(window, segment, &JOB_STARTED_EVENTS).await?;
    let jobs_succeeded = store.count_events(window, segment, &JOB_SUCCEEDED_EVENTS).await?;
    let jobs_failed = store.count_events(window, segment, &JOB_FAILED_EVENTS).await?;

    // all 세그먼트에서만 의미 있는 값
    let paying_active_users = match segment {
        Segment::All if active_users > 0 => {
            store.count_active_users(window, Segment::Paying).await?
        }
        _ => 0,
    };

    Ok(OverviewMetrics {
        new_users,
        active_users,
        jobs_started,
        jobs_succeeded,
        jobs_failed,
        conversion_to_pay: conversion_to_pay(segment, active_users, paying_active_users),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_zero_active() {
        for segment in [Segment::All, Segment::Paying, Segment::NonPaying] {
            assert_eq!(conversion_to_pay(segment, 0, 0), 0.0);
        }
    }

    #[test]
    fn test_conversion_is_gated_by_segment() {
        assert_eq!(conversion_to_pay(Segment::Paying, 4, 0), 1.0);
        assert_eq!(conversion_to_pay(Segment::NonPaying, 4, 4), 0.0);
        assert_eq!(conversion_to_pay(Segment::All, 4, 1), 0.25);
        assert_eq!(conversion_to_pay(Segment::All, 4, 4), 1.0);
    }

    #[test]
    fn test_event_sets_are_disjoint() {
        for started in JOB_STARTED_EVENTS {
            assert!(!JOB_SUCCEEDED_EVENTS.contains(&started));
            assert!(!JOB_FAILED_EVENTS.contains(&started));
        }
        for succeeded in JOB_SUCCEEDED_EVENTS {
            assert!(!JOB_FAILED_EVENTS.contains(&succeeded));
        }
    }
}
