//! Database Models
//!
//! Read-only views over the product's event-sourcing schema:
//! `users`, `credit_ledger`, `iap_transactions`, `event_log`.
//! Rows are never written from this service.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;

/// 사용자
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct User {
    pub id: i64,
    pub created_at: DateTime<Utc>,

    /// 설치 식별자 해시
    pub install_id_hash: Option<String>,

    /// 외부 인증(Google) subject
    pub google_sub: Option<String>,

    /// 현재 크레딧 잔액 (원장 side effect 로 외부에서 갱신됨)
    pub credits_balance: i32,

    /// 계정 병합 시 살아남은 사용자 id.
    /// 대상도 다시 병합되었을 수 있으므로 단일 hop 해석은 보장되지 않음
    pub merged_into_user_id: Option<i64>,

    pub last_seen_at: Option<DateTime<Utc>>,
}

/// 사용자 + 파생 결제 여부 (저장되지 않고 조회마다 계산)
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct UserSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub user: User,
    pub paying: bool,
}

/// 크레딧 원장 항목 (append-only)
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct CreditLedgerEntry {
    pub id: i64,
    pub user_id: i64,

    /// `topup_*`, 사용 차감 등
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,

    pub delta: i32,
    pub ref_type: Option<String>,
    pub ref_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 인앱 결제 트랜잭션
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct IapTransaction {
    pub id: i64,
    pub user_id: i64,
    pub store: String,
    pub product_id: Option<String>,
    pub purchase_token: Option<String>,

    /// pending / verified / failed / refunded
    pub status: String,

    /// 스토어 원본 응답. 로그나 에러 메시지에 절대 포함하지 않음
    pub raw_payload: Option<Value>,

    pub created_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
}

/// 텔레메트리 이벤트 (append-only)
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct EventLogEntry {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub trace_id: Option<String>,
    pub user_id: Option<i64>,
    pub job_id: Option<String>,
    pub event: String,
    pub payload: Option<Value>,
}

impl EventLogEntry {
    pub fn error_type(&self) -> Option<String> {
        payload_text(self.payload.as_ref(), "error_type")
    }

    pub fn error_message(&self) -> Option<String> {
        payload_text(self.payload.as_ref(), "error_message")
    }
}

/// JSON payload 의 키를 텍스트로 투영 (Postgres jsonb `payload->>'key'`)
///
/// - payload 없음, 객체 아님, 키 없음, JSON null → `None`
/// - 문자열 → 그대로 (빈 문자열도 `Some("")`)
/// - 객체/배열 → jsonb 출력 형식 (`{"a": 1, "bb": [1, 2]}`)
/// - 그 외 스칼라 → JSON 텍스트
///
/// 숫자는 serde_json 표현을 따르므로 `1e2` 같은 지수 표기는 Postgres
/// numeric 출력(`100`)과 다를 수 있음
pub fn payload_text(payload: Option<&Value>, key: &str) -> Option<String> {
    match payload?.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => {
            let mut out = String::new();
            write_jsonb_text(other, &mut out);
            Some(out)
        }
    }
}

/// jsonb 텍스트 출력: 키는 (길이, 바이트) 순, 구분자는 `", "` / `": "`
fn write_jsonb_text(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

            out.push('{');
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push_str(": ");
                write_jsonb_text(value, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_jsonb_text(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
