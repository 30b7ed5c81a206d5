//! Error Grouper
//!
//! An event counts as an error when its name contains `failed`
//! (case-insensitive) or its payload carries `error_type` / `error_message`.
//! Matching events are grouped by `(event, error_type, error_message)`;
//! absent fields are a group key of their own.

use std::collections::HashMap;

use serde::Serialize;
use sqlx::FromRow;

use crate::db::EventLogEntry;

/// 이벤트 이름에 포함되면 에러로 간주하는 부분 문자열 (대소문자 무시)
pub const FAILED_MARKER: &str = "failed";

/// 에러 그룹
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct ErrorGroup {
    pub event: String,
    pub error_type: Option<String>,
    pub error_message: Option<String>,
    pub count: i64,

    /// 그룹 내 최소 trace id (대표 샘플)
    pub sample_trace_id: Option<String>,

    /// 그룹 내 최소 job id (대표 샘플)
    pub sample_job_id: Option<String>,
}

/// 에러 목록 응답
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    /// limit 적용 전, 조건에 맞는 전체 이벤트 행 수
    pub total: i64,
    pub items: Vec<ErrorGroup>,
}

pub fn is_error_event(entry: &EventLogEntry) -> bool {
    entry.event.to_lowercase().contains(FAILED_MARKER)
        || entry.error_type().is_some()
        || entry.error_message().is_some()
}

type GroupKey = (String, Option<String>, Option<String>);

/// 인메모리 그룹핑. 윈도우 필터는 호출자가 적용
///
/// 정렬: count 내림차순, 동률이면 키 오름차순 (None 먼저) → 동일 입력에 동일 결과
pub fn group_errors<'a>(
    events: impl IntoIterator<Item = &'a EventLogEntry>,
    limit: u32,
) -> (i64, Vec<ErrorGroup>) {
    let mut total = 0i64;
    let mut groups: HashMap<GroupKey, ErrorGroup> = HashMap::new();

    for entry in events.into_iter().filter(|e| is_error_event(e)) {
        total += 1;

        let key = (entry.event.clone(), entry.error_type(), entry.error_message());
        let group = groups.entry(key.clone()).or_insert_with(|| ErrorGroup {
            event: key.0,
            error_type: key.1,
            error_message: key.2,
            count: 0,
            sample_trace_id: None,
            sample_job_id: None,
        });

        group.count += 1;
        group.sample_trace_id = min_present(group.sample_trace_id.take(), entry.trace_id.as_ref());
        group.sample_job_id = min_present(group.sample_job_id.take(), entry.job_id.as_ref());
    }

    let mut ranked: Vec<ErrorGroup> = groups.into_values().collect();
    ranked.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.event.cmp(&b.event))
            .then_with(|| a.error_type.cmp(&b.error_type))
            .then_with(|| a.error_message.cmp(&b.error_message))
    });
    ranked.truncate(limit as usize);

    (total, ranked)
}

/// SQL `MIN()` 처럼 NULL 은 무시
fn min_present(current: Option<String>, candidate: Option<&String>) -> Option<String> {
    match (current, candidate) {
        (Some(current), Some(candidate)) if candidate < &current => Some(candidate.clone()),
        (None, Some(candidate)) => Some(candidate.clone()),
        (current, _) => current,
    }
}
