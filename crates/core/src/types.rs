//! 도메인 타입 -- 시스템 전역에서 사용되는 공통 타입
//!
//! 방화벽 어플라이언스가 보내는 `key=value` 로그를 파싱한 결과를 표현합니다.
//! 수집기, 집계기, 브로드캐스터가 모두 이 타입으로 레코드를 주고받습니다.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// 고정 필드 이름 목록
///
/// 어플라이언스가 같은 이름의 키를 보내더라도 직렬화 시 고정 필드가 우선합니다.
pub const RESERVED_FIELDS: [&str; 5] = [
    "raw",
    "received_at",
    "timestamp",
    "source_ip",
    "log_category",
];

/// 로그 필드 값
///
/// 10진수 숫자로만 이루어진 값은 정수로, 그 외에는 문자열로 저장됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// 숫자로만 구성된 값 (예: `srcport=443`, `policyid=007`)
    Int(u64),
    /// 그 외 모든 값
    Text(String),
}

impl FieldValue {
    /// 원시 문자열에 숫자 변환 규칙을 적용합니다.
    ///
    /// ASCII 숫자로만 구성되고 `u64` 범위 안이면 `Int`, 아니면 `Text`입니다.
    /// 빈 문자열은 `Text("")`입니다.
    pub fn coerce(value: &str) -> Self {
        if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = value.parse::<u64>() {
                return Self::Int(n);
            }
        }
        Self::Text(value.to_owned())
    }

    /// 문자열 값이면 참조를 반환합니다.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Int(_) => None,
        }
    }

    /// 정수 값이면 반환합니다.
    pub fn as_int(&self) -> Option<u64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    /// 값의 텍스트 표현을 반환합니다. 문자열이면 복사하지 않습니다.
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            Self::Text(s) => Cow::Borrowed(s),
            Self::Int(n) => Cow::Owned(n.to_string()),
        }
    }

    /// 빈 문자열인지 확인합니다.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Text(s) if s.is_empty())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        Self::Int(value)
    }
}

/// 파싱된 방화벽 로그 레코드
///
/// 생성 후에는 변경되지 않으며, 파이프라인 내부에서는 `Arc<LogRecord>`로 공유됩니다.
/// 고정 필드 외의 필드는 어플라이언스가 정의하며 레코드마다 다를 수 있습니다.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// 우선순위 헤더를 제거한 원본 텍스트
    pub raw: String,
    /// 수신 시각
    pub received_at: DateTime<Utc>,
    /// `date` + `time` 필드로 합성한 ISO-8601 타임스탬프 (둘 다 있을 때만)
    pub timestamp: Option<String>,
    /// 데이터그램 송신자 주소
    pub source_ip: Option<String>,
    /// 분류기가 부여한 카테고리 태그
    pub log_category: String,
    /// 어플라이언스 정의 필드
    pub fields: BTreeMap<String, FieldValue>,
}

impl LogRecord {
    /// 필드가 없는 최소 레코드를 생성합니다.
    pub fn new(raw: impl Into<String>, received_at: DateTime<Utc>) -> Self {
        Self {
            raw: raw.into(),
            received_at,
            timestamp: None,
            source_ip: None,
            log_category: String::new(),
            fields: BTreeMap::new(),
        }
    }

    /// 송신자 주소를 설정합니다.
    pub fn with_source_ip(mut self, source_ip: impl Into<String>) -> Self {
        self.source_ip = Some(source_ip.into());
        self
    }

    /// 필드 값을 조회합니다.
    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// 비어 있지 않은 필드의 텍스트 표현을 조회합니다.
    ///
    /// 필드가 없거나 빈 문자열이면 `None`입니다.
    pub fn text(&self, key: &str) -> Option<Cow<'_, str>> {
        self.fields
            .get(key)
            .filter(|v| !v.is_empty())
            .map(FieldValue::to_text)
    }

    /// 표시용 타임스탬프를 반환합니다.
    ///
    /// 합성된 `timestamp`가 없으면 `received_at`으로 대체합니다.
    pub fn effective_timestamp(&self) -> Cow<'_, str> {
        match &self.timestamp {
            Some(ts) => Cow::Borrowed(ts),
            None => Cow::Owned(
                self.received_at
                    .to_rfc3339_opts(SecondsFormat::Micros, true),
            ),
        }
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}",
            self.log_category,
            self.source_ip.as_deref().unwrap_or("-"),
            self.raw,
        )
    }
}

impl Serialize for LogRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (key, value) in &self.fields {
            if RESERVED_FIELDS.contains(&key.as_str()) {
                continue;
            }
            map.serialize_entry(key, value)?;
        }
        map.serialize_entry("raw", &self.raw)?;
        map.serialize_entry("received_at", &self.received_at)?;
        if let Some(ts) = &self.timestamp {
            map.serialize_entry("timestamp", ts)?;
        }
        if let Some(ip) = &self.source_ip {
            map.serialize_entry("source_ip", ip)?;
        }
        map.serialize_entry("log_category", &self.log_category)?;
        map.end()
    }
}
