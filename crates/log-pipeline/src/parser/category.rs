//! 로그 카테고리 분류기
//!
//! `type`/`subtype` 쌍을 대시보드 카테고리 태그로 매핑합니다.
//! 테이블에 없는 쌍은 `"{type}_{subtype}"`으로 대체됩니다.

use std::borrow::Cow;

/// `(type, subtype, category)` 매핑 테이블
const CATEGORY_TABLE: &[(&str, &str, &str)] = &[
    ("traffic", "forward", "traffic_forward"),
    ("traffic", "local", "traffic_local"),
    ("utm", "virus", "security_av"),
    ("utm", "webfilter", "security_web"),
    ("utm", "ips", "security_ips"),
    ("utm", "app-ctrl", "security_app"),
    ("event", "system", "event_system"),
    ("event", "vpn", "event_vpn"),
    ("event", "user", "event_user"),
];

/// `type`/`subtype` 쌍의 카테고리를 반환합니다.
///
/// 없는 필드는 빈 문자열로 전달합니다.
pub fn categorize(log_type: &str, subtype: &str) -> Cow<'static, str> {
    CATEGORY_TABLE
        .iter()
        .find(|(t, s, _)| *t == log_type && *s == subtype)
        .map(|(_, _, category)| Cow::Borrowed(*category))
        .unwrap_or_else(|| Cow::Owned(format!("{log_type}_{subtype}")))
}

/// 메트릭 레이블로 쓸 카테고리 값을 반환합니다.
///
/// 레이블 값은 테이블의 카테고리로 한정합니다. 테이블 밖의 카테고리는 송신자가
/// 임의로 만들 수 있으므로 모두 `"other"`로 묶습니다.
pub fn metric_label(category: &str) -> &'static str {
    CATEGORY_TABLE
        .iter()
        .find(|(_, _, known)| *known == category)
        .map_or("other", |(_, _, known)| *known)
}
