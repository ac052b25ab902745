//! 로그 파싱 모듈 -- 방화벽 `key=value` 로그 파서와 카테고리 분류기
//!
//! [`KeyValueParser`]는 core의 [`LogParser`](gatewatch_core::pipeline::LogParser)
//! trait을 구현합니다. 네트워크 입력은 신뢰할 수 없으므로 파서는 실패하지 않고,
//! 해석할 수 없는 입력은 필드가 없는 최소 레코드가 됩니다.
//!
//! # 사용 예시
//! ```
//! use gatewatch_core::pipeline::LogParser;
//! use gatewatch_log_pipeline::parser::KeyValueParser;
//!
//! let parser = KeyValueParser::new();
//! let record = parser.parse(r#"type=utm subtype=webfilter action=blocked msg="URL blocked""#);
//! assert_eq!(record.log_category, "security_web");
//! assert_eq!(record.text("msg").as_deref(), Some("URL blocked"));
//! ```

pub mod category;
pub mod kv;

pub use category::categorize;
pub use kv::KeyValueParser;

/// 파서 기본 최대 입력 크기 (64KB)
pub const DEFAULT_MAX_INPUT_SIZE: usize = 64 * 1024;
