//! Admin Authentication
//!
//! # Interview Q&A
//!
//! Q: 두 가지 인증 방식을 모두 받는 이유는?
//! A: 용도가 다름
//!    - `X-Admin-Token`: 스크립트/내부 도구 호출
//!    - HTTP Basic: 브라우저에서 직접 콘솔 API 확인 (401 + `WWW-Authenticate` 로 로그인 창)
//!
//! Q: 문자열 비교를 `==` 로 하지 않는 이유는?
//! A: 첫 불일치 바이트에서 끝나는 비교는 응답 시간으로 토큰을 추측할 수 있음
//!    → 길이가 같으면 전체 바이트를 항상 비교

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::config::Config;
use crate::error::ApiError;
use crate::AppState;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// 설정에서 추출한 관리자 자격 증명
#[derive(Debug, Clone, Default)]
pub struct AdminCredentials {
    token: Option<String>,
    basic: Option<(String, String)>,
}

impl AdminCredentials {
    pub fn new(token: Option<String>, basic: Option<(String, String)>) -> Self {
        Self { token, basic }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.admin_token.clone(), config.basic_auth.clone())
    }

    /// 요청 헤더가 토큰 또는 Basic 계정 중 하나와 일치하는지
    ///
    /// 아무 자격 증명도 설정되지 않았으면 항상 거부
    pub fn authorize(&self, headers: &HeaderMap) -> bool {
        let token_ok = match (&self.token, header_str(headers, ADMIN_TOKEN_HEADER)) {
            (Some(expected), Some(given)) => constant_time_eq(expected, given),
            _ => false,
        };

        let basic_ok = match (&self.basic, basic_credentials(headers)) {
            (Some((username, password)), Some((given_user, given_pass))) => {
                // 둘 다 비교 (short-circuit 없음)
                constant_time_eq(username, &given_user) & constant_time_eq(password, &given_pass)
            }
            _ => false,
        };

        token_ok || basic_ok
    }
}

/// `/admin/v1` 라우트 보호 미들웨어
pub async fn require_admin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.credentials.authorize(req.headers()) {
        tracing::debug!(path = %req.uri().path(), "admin authentication failed");
        return Err(ApiError::Unauthorized);
    }

    Ok(next.run(req).await)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// `Authorization: Basic base64(user:pass)` 파싱
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = header_str(headers, header::AUTHORIZATION.as_str())?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// 길이가 같으면 모든 바이트를 비교하는 문자열 비교
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        diff |= x ^ y;
    }
    diff == 0
}
