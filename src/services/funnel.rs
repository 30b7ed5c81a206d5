//! Funnel Engine
//!
//! # Interview Q&A
//!
//! Q: 전환율이 1.0 을 넘을 수 있는가?
//! A: 그렇다. 단계 간 인과 순서를 강제하지 않으므로, 이전 단계 이벤트가
//!    누락된 사용자가 다음 단계에 잡히면 current > previous 가 된다.
//!    계측 누락을 드러내는 값이므로 clamp 하지 않는다.
//!
//! Q: 이전 단계가 0 명이면?
//! A: 0.0 (0 나누기 방지, "아무도 이전 단계에 오지 않음" = 0%)

use std::collections::HashMap;

use serde::Serialize;

/// 생성 파이프라인 퍼널 (순서 고정)
pub const FUNNEL_STEPS: [&str; 5] = [
    "upload_started",
    "face_analysis_success",
    "llm_core_generation_success",
    "llm_image_prompt_success",
    "image_generation_success",
];

/// 퍼널 단계 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelStep {
    pub event: String,

    /// 윈도우 내 해당 이벤트를 남긴 distinct 사용자 수
    pub count: i64,

    /// 직전 단계 대비 비율 (첫 단계는 항상 1.0)
    pub conversion_from_prev: f64,
}

/// 단계별 카운트 → 단계별 전환율
///
/// `counts` 에 없는 단계는 0 으로 취급
pub fn build_steps(steps: &[&str], counts: &HashMap<String, i64>) -> Vec<FunnelStep> {
    let mut previous: Option<i64> = None;

    steps
        .iter()
        .map(|&event| {
            let count = counts.get(event).copied().unwrap_or(0);
            let step = FunnelStep {
                event: event.to_string(),
                count,
                conversion_from_prev: conversion(previous, count),
            };
            previous = Some(count);
            step
        })
        .collect()
}

fn conversion(previous: Option<i64>, current: i64) -> f64 {
    match previous {
        None => 1.0,
        Some(0) => 0.0,
        Some(prev) => current as f64 / prev as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(pairs: &[(&str, i64)]) -> HashMap<String, i64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_zero_step_guards_following_steps() {
        let steps = build_steps(
            &FUNNEL_STEPS[..4],
            &counts(&[
                ("upload_started", 100),
                ("face_analysis_success", 80),
                ("llm_core_generation_success", 0),
                ("llm_image_prompt_success", 5),
            ]),
        );

        let pairs: Vec<(i64, f64)> = steps.iter().map(|s| (s.count, s.conversion_from_prev)).collect();
        assert_eq!(pairs, vec![(100, 1.0), (80, 0.8), (0, 0.0), (5, 0.0)]);
    }

    #[test]
    fn test_conversion_is_not_clamped() {
        let steps = build_steps(
            &["a", "b"],
            &counts(&[("a", 10), ("b", 12)]),
        );
        assert!((steps[1].conversion_from_prev - 1.2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_first_step_always_one() {
        let steps = build_steps(&FUNNEL_STEPS, &HashMap::new());
        assert_eq!(steps.len(), FUNNEL_STEPS.len());
        assert_eq!(steps[0].conversion_from_prev, 1.0);
        assert_eq!(steps[0].count, 0);
        assert!(steps[1..].iter().all(|s| s.conversion_from_prev == 0.0));
    }

    #[test]
    fn test_steps_keep_funnel_order() {
        let steps = build_steps(&FUNNEL_STEPS, &counts(&[("image_generation_success", 3)]));
        let names: Vec<&str> = steps.iter().map(|s| s.event.as_str()).collect();
        assert_eq!(names, FUNNEL_STEPS.to_vec());
        assert_eq!(steps[4].count, 3);
        assert_eq!(steps[4].conversion_from_prev, 0.0);
    }
}
