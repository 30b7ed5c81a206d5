//! Segmentation Engine
//!
//! # Interview Q&A
//!
//! Q: "결제 사용자"를 users 테이블 컬럼으로 저장하지 않는 이유는?
//! A: 파생 값이기 때문
//!    - 신호 1: `iap_transactions.status = 'verified'`
//!    - 신호 2: `credit_ledger.type LIKE 'topup_%' AND delta > 0`
//!    - 둘 중 하나라도 있으면 결제 사용자 (전체 이력 기준, 윈도우 무관)
//!    - 저장하면 원장/결제 테이블과 어긋날 수 있음 → 조회마다 재계산
//!
//! Q: 세그먼트 조건을 메트릭마다 따로 작성하면?
//! A: union 조건이 조금씩 달라지는 순간 paying + non_paying ≠ all.
//!    모든 쿼리는 이 모듈의 `PAYING_USER_IDS_SQL` / `PayingSet` 만 사용

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::db::{CreditLedgerEntry, IapTransaction};

/// IAP 검증 완료 상태
pub const VERIFIED_STATUS: &str = "verified";

/// 충전(top-up) 원장 타입 prefix
pub const TOPUP_PREFIX: &str = "topup_";

/// 결제 사용자 id 집합 서브쿼리 (Postgres)
///
/// `\_` 는 LIKE 의 와일드카드가 아닌 리터럴 `_`
pub const PAYING_USER_IDS_SQL: &str = r"SELECT user_id FROM iap_transactions WHERE status = 'verified' UNION SELECT user_id FROM credit_ledger WHERE type LIKE 'topup\_%' AND delta > 0";

/// 사용자 세그먼트
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    #[default]
    All,
    Paying,
    NonPaying,
}

impl Segment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Segment::All => "all",
            Segment::Paying => "paying",
            Segment::NonPaying => "non_paying",
        }
    }

    /// 사용자 id 컬럼에 대한 SQL 조건. `All` 이면 필터 없음
    ///
    /// NULL id 는 `IN` / `NOT IN` 모두에서 제외됨 (SQL 3값 논리)
    pub fn sql_clause(&self, column: &str) -> Option<String> {
        match self {
            Segment::All => None,
            Segment::Paying => Some(format!("{column} IN ({PAYING_USER_IDS_SQL})")),
            Segment::NonPaying => Some(format!("{column} NOT IN ({PAYING_USER_IDS_SQL})")),
        }
    }

    /// `sql_clause` 의 인메모리 대응
    pub fn admits(&self, user_id: Option<i64>, paying: &PayingSet) -> bool {
        match (self, user_id) {
            (Segment::All, _) => true,
            (_, None) => false,
            (Segment::Paying, Some(id)) => paying.contains(id),
            (Segment::NonPaying, Some(id)) => !paying.contains(id),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn is_verified_purchase(tx: &IapTransaction) -> bool {
    tx.status == VERIFIED_STATUS
}

pub fn is_paid_topup(entry: &CreditLedgerEntry) -> bool {
    entry.kind.starts_with(TOPUP_PREFIX) && entry.delta > 0
}

/// 결제 사용자 id 집합 (전체 이력 기준)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PayingSet {
    ids: BTreeSet<i64>,
}

impl PayingSet {
    /// 두 신호의 합집합
    pub fn from_records<'a>(
        purchases: impl IntoIterator<Item = &'a IapTransaction>,
        ledger: impl IntoIterator<Item = &'a CreditLedgerEntry>,
    ) -> Self {
        let mut ids: BTreeSet<i64> = purchases
            .into_iter()
            .filter(|tx| is_verified_purchase(tx))
            .map(|tx| tx.user_id)
            .collect();

        ids.extend(
            ledger
                .into_iter()
                .filter(|entry| is_paid_topup(entry))
                .map(|entry| entry.user_id),
        );

        Self { ids }
    }

    pub fn contains(&self, user_id: i64) -> bool {
        self.ids.contains(&user_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.ids.iter().copied()
    }
}

impl FromIterator<i64> for PayingSet {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}
