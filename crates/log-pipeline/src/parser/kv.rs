//! 방화벽 `key=value` 로그 파서
//!
//! # 문법
//! ```text
//! date=2024-01-15 time=10:30:45 type="traffic" subtype="forward" srcip=10.0.0.5 action=deny
//! ```
//!
//! - `key`는 단어 문자(`\w`)의 연속
//! - 값은 큰따옴표로 감싸면 공백을 포함할 수 있고, 아니면 공백 전까지
//! - 같은 키가 여러 번 나오면 마지막 값이 남음
//! - 숫자로만 된 값은 정수로 변환 ([`FieldValue::coerce`])

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use gatewatch_core::pipeline::LogParser;
use gatewatch_core::types::{FieldValue, LogRecord};

use super::DEFAULT_MAX_INPUT_SIZE;
use super::category::categorize;

/// 토큰 패턴: 그룹 1 = 키, 그룹 2 = 따옴표 값, 그룹 3 = 일반 값
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\w+)=(?:"([^"]*)"|(\S+))"#).expect("token pattern is a valid regex")
});

/// 방화벽 `key=value` 로그 파서
///
/// core의 [`LogParser`] trait을 구현합니다.
/// 상태가 없으므로 여러 태스크에서 공유해도 됩니다.
#[derive(Debug, Clone)]
pub struct KeyValueParser {
    /// 최대 허용 입력 크기 (바이트)
    max_input_size: usize,
}

impl KeyValueParser {
    /// 기본 설정으로 새 파서를 생성합니다.
    pub fn new() -> Self {
        Self {
            max_input_size: DEFAULT_MAX_INPUT_SIZE,
        }
    }

    /// 최대 입력 크기를 설정합니다.
    pub fn with_max_input_size(mut self, size: usize) -> Self {
        self.max_input_size = size;
        self
    }

    /// 최대 입력 크기를 반환합니다.
    pub fn max_input_size(&self) -> usize {
        self.max_input_size
    }

    /// 수신 시각을 지정하여 파싱합니다.
    pub fn parse_at(&self, line: &str, received_at: DateTime<Utc>) -> LogRecord {
        let truncated = truncate_at_char_boundary(line, self.max_input_size);
        if truncated.len() < line.len() {
            tracing::debug!(
                original = line.len(),
                max = self.max_input_size,
                "input truncated to max input size"
            );
        }
        let line = truncated;

        let mut record = LogRecord::new(line, received_at);
        record.fields = tokenize(line);

        if let (Some(date), Some(time)) = (record.field("date"), record.field("time")) {
            record.timestamp = Some(format!("{date}T{time}"));
        }

        let log_type = record.field("type").map(FieldValue::to_text);
        let subtype = record.field("subtype").map(FieldValue::to_text);
        record.log_category = categorize(
            log_type.as_deref().unwrap_or(""),
            subtype.as_deref().unwrap_or(""),
        )
        .into_owned();

        record
    }
}

impl Default for KeyValueParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LogParser for KeyValueParser {
    fn format_name(&self) -> &str {
        "fortigate-kv"
    }

    fn parse(&self, line: &str) -> LogRecord {
        self.parse_at(line, Utc::now())
    }
}

/// 텍스트에서 모든 `key=value` 토큰을 추출합니다.
fn tokenize(line: &str) -> BTreeMap<String, FieldValue> {
    let mut fields = BTreeMap::new();
    for caps in TOKEN_RE.captures_iter(line) {
        let (Some(key), Some(value)) = (caps.get(1), caps.get(2).or_else(|| caps.get(3))) else {
            continue;
        };
        fields.insert(key.as_str().to_owned(), FieldValue::coerce(value.as_str()));
    }
    fields
}

/// 바이트 길이 `max` 이하의 가장 긴 char 경계에서 문자열을 자릅니다.
fn truncate_at_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> LogRecord {
        KeyValueParser::new().parse(line)
    }

    #[test]
    fn parses_traffic_deny_line() {
        let record = parse(
            r#"date=2024-01-15 time=10:30:45 type="traffic" subtype="forward" srcip=192.168.1.100 dstip=8.8.8.8 srcport=54321 dstport=53 action="deny" policyid=1"#,
        );

        assert_eq!(record.timestamp.as_deref(), Some("2024-01-15T10:30:45"));
        assert_eq!(record.log_category, "traffic_forward");
        assert_eq!(record.text("srcip").as_deref(), Some("192.168.1.100"));
        assert_eq!(record.field("srcport"), Some(&FieldValue::Int(54321)));
        assert_eq!(record.field("policyid"), Some(&FieldValue::Int(1)));
        assert_eq!(record.text("action").as_deref(), Some("deny"));
    }

    #[test]
    fn quoted_values_keep_spaces() {
        let record = parse(r#"type=utm subtype=webfilter msg="URL belongs to a denied category" catdesc="Social Networking""#);
        assert_eq!(
            record.text("msg").as_deref(),
            Some("URL belongs to a denied category")
        );
        assert_eq!(record.text("catdesc").as_deref(), Some("Social Networking"));
        assert_eq!(record.log_category, "security_web");
    }

    #[test]
    fn digits_with_leading_zeros_become_int() {
        let record = parse("policyid=007");
        assert_eq!(record.field("policyid"), Some(&FieldValue::Int(7)));
    }

    #[test]
    fn empty_quoted_value_is_empty_text() {
        let record = parse(r#"action="" srcip=10.0.0.1"#);
        assert_eq!(record.field("action"), Some(&FieldValue::from("")));
        assert!(record.text("action").is_none());
    }

    #[test]
    fn last_duplicate_key_wins() {
        let record = parse("action=accept action=deny");
        assert_eq!(record.text("action").as_deref(), Some("deny"));
        assert_eq!(record.fields.len(), 1);
    }

    #[test]
    fn input_without_tokens_yields_minimal_record() {
        let record = parse("this line has no pairs at all");
        assert!(record.fields.is_empty());
        assert_eq!(record.raw, "this line has no pairs at all");
        assert_eq!(record.log_category, "_");
        assert!(record.timestamp.is_none());
    }

    #[test]
    fn empty_input_yields_minimal_record() {
        let record = parse("");
        assert!(record.fields.is_empty());
        assert_eq!(record.raw, "");
    }

    #[test]
    fn timestamp_requires_both_date_and_time() {
        assert!(parse("date=2024-01-15 type=event").timestamp.is_none());
        assert!(parse("time=10:30:45 type=event").timestamp.is_none());
    }

    #[test]
    fn missing_subtype_uses_empty_string() {
        let record = parse("type=event");
        assert_eq!(record.log_category, "event_");
    }

    #[test]
    fn unquoted_value_stops_at_whitespace() {
        let record = parse("msg=hello world=1");
        assert_eq!(record.text("msg").as_deref(), Some("hello"));
        assert_eq!(record.field("world"), Some(&FieldValue::Int(1)));
    }

    #[test]
    fn unterminated_quote_falls_back_to_unquoted_token() {
        let record = parse(r#"msg="broken value"#);
        assert_eq!(record.text("msg").as_deref(), Some("\"broken"));
    }

    #[test]
    fn oversized_input_is_truncated_at_char_boundary() {
        let parser = KeyValueParser::new().with_max_input_size(10);
        // "가"는 3바이트이므로 10바이트 경계는 문자 중간
        let record = parser.parse("k=가나다라마");
        assert!(record.raw.len() <= 10);
        assert_eq!(record.raw, "k=가나");
        assert_eq!(record.text("k").as_deref(), Some("가나"));
    }

    #[test]
    fn format_name_is_stable() {
        assert_eq!(KeyValueParser::new().format_name(), "fortigate-kv");
    }

    #[test]
    fn parse_at_uses_given_received_at() {
        let at = DateTime::parse_from_rfc3339("2024-01-15T10:30:45Z")
            .unwrap()
            .with_timezone(&Utc);
        let record = KeyValueParser::new().parse_at("type=event subtype=system", at);
        assert_eq!(record.received_at, at);
        assert_eq!(record.log_category, "event_system");
    }

    #[cfg(test)]
    mod proptests {
        use super::*;
        use proptest::prelude::*;
        use std::collections::BTreeSet;

        proptest! {
            #[test]
            fn parse_arbitrary_text_does_not_panic(line in ".{0,512}") {
                let _ = KeyValueParser::new().parse(&line);
            }

            #[test]
            fn key_set_matches_generated_pairs(
                pairs in prop::collection::btree_map("[a-z][a-z0-9_]{0,8}", "[a-zA-Z0-9.:/-]{1,12}", 0..12)
            ) {
                let line = pairs
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join(" ");
                let record = KeyValueParser::new().parse(&line);
                let parsed: BTreeSet<_> = record.fields.keys().cloned().collect();
                let expected: BTreeSet<_> = pairs.keys().cloned().collect();
                prop_assert_eq!(parsed, expected);
            }

            #[test]
            fn quoted_values_round_trip(value in "[a-zA-Z0-9 .,:/-]{0,40}") {
                let record = KeyValueParser::new().parse(&format!("msg=\"{value}\""));
                let field = record.field("msg").cloned();
                prop_assert_eq!(field, Some(FieldValue::coerce(&value)));
            }

            #[test]
            fn truncated_raw_never_exceeds_limit(line in ".{0,300}", max in 1usize..200) {
                let record = KeyValueParser::new().with_max_input_size(max).parse(&line);
                prop_assert!(record.raw.len() <= max);
            }
        }
    }
}
