//! 집계 규칙 -- 판정, 목적지 선택, 점 표기 IP 판별

use std::borrow::Cow;

use gatewatch_core::types::LogRecord;

const BLOCKED_ACTIONS: [&str; 5] = ["deny", "denied", "blocked", "drop", "block"];
const ALLOWED_ACTIONS: [&str; 5] = ["accept", "accepted", "allow", "allowed", "pass"];

/// `action` 필드의 판정 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// 차단 (deny, denied, blocked, drop, block)
    Blocked,
    /// 허용 (accept, accepted, allow, allowed, pass)
    Allowed,
    /// 그 외 (total에만 반영)
    Other,
}

impl Verdict {
    /// action 값을 대소문자 구분 없이 판정합니다.
    pub fn of(action: Option<&str>) -> Self {
        let Some(action) = action else {
            return Self::Other;
        };
        if BLOCKED_ACTIONS.iter().any(|a| a.eq_ignore_ascii_case(action)) {
            Self::Blocked
        } else if ALLOWED_ACTIONS.iter().any(|a| a.eq_ignore_ascii_case(action)) {
            Self::Allowed
        } else {
            Self::Other
        }
    }

    /// 메트릭 레이블 값
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blocked => "blocked",
            Self::Allowed => "allowed",
            Self::Other => "other",
        }
    }
}

/// `a.b.c.d` 형태이고 각 부분이 0-255 십진수인지 확인합니다.
pub fn is_dotted_quad(value: &str) -> bool {
    let mut parts = 0;
    for part in value.split('.') {
        parts += 1;
        if parts > 4
            || part.is_empty()
            || !part.bytes().all(|b| b.is_ascii_digit())
            || !part.parse::<u32>().is_ok_and(|n| n <= 255)
        {
            return false;
        }
    }
    parts == 4
}

/// 레코드의 목적지를 고릅니다.
///
/// `hostname`이 있고, `dstip`과 다르고, 점 표기 IP가 아니면 `hostname`.
/// 그렇지 않으면 `dstip`. 둘 다 없으면 `None`입니다.
pub fn destination_of(record: &LogRecord) -> Option<Cow<'_, str>> {
    let dstip = record.text("dstip");
    if let Some(hostname) = record.text("hostname") {
        let differs = dstip.as_deref() != Some(&*hostname);
        if differs && !is_dotted_quad(&hostname) {
            return Some(hostname);
        }
    }
    dstip
}
