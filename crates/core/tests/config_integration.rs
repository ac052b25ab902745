//! gatewatch.toml 통합 설정 테스트
//!
//! - gatewatch.toml.example 파싱 테스트
//! - 부분 설정 (일부 섹션만) 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 빈 파일 / 잘못된 형식 에러 테스트

use std::io::Write;

use gatewatch_core::config::GatewatchConfig;
use gatewatch_core::error::{ConfigError, GatewatchError};

const EXAMPLE: &str = include_str!("../../../gatewatch.toml.example");

// =============================================================================
// gatewatch.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let config = GatewatchConfig::parse(EXAMPLE).expect("example config should parse");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "json");
    assert_eq!(config.appliances.len(), 2);
    assert_eq!(config.appliances[0].id, "fg60f-30th");
    assert_eq!(config.appliances[1].port, 5515);
}

#[test]
fn example_config_passes_validation() {
    let config = GatewatchConfig::parse(EXAMPLE).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_matches_code_defaults() {
    let config = GatewatchConfig::parse(EXAMPLE).expect("should parse");
    let defaults = GatewatchConfig::default();

    assert_eq!(config.general.log_level, defaults.general.log_level);
    assert_eq!(config.collector.bind_host, defaults.collector.bind_host);
    assert_eq!(config.collector.max_logs, defaults.collector.max_logs);
    assert_eq!(
        config.collector.max_datagram_size,
        defaults.collector.max_datagram_size
    );
    assert_eq!(
        config.collector.dispatch_queue_capacity,
        defaults.collector.dispatch_queue_capacity
    );
    assert_eq!(
        config.collector.stats_interval_secs,
        defaults.collector.stats_interval_secs
    );
    assert_eq!(
        config.collector.broadcast_capacity,
        defaults.collector.broadcast_capacity
    );
    assert_eq!(config.metrics.enabled, defaults.metrics.enabled);
    assert_eq!(config.metrics.port, defaults.metrics.port);
    assert_eq!(config.metrics.endpoint, defaults.metrics.endpoint);
}

// =============================================================================
// 부분 설정 로딩 테스트
// =============================================================================

#[test]
fn partial_config_general_only() {
    let config = GatewatchConfig::parse(
        r#"
[general]
log_level = "debug"
"#,
    )
    .expect("should parse");

    assert_eq!(config.general.log_level, "debug");
    // 지정하지 않은 필드는 기본값
    assert_eq!(config.general.log_format, "json");
    assert_eq!(config.collector.max_logs, 1000);
    assert_eq!(config.appliances.len(), 1);
}

#[test]
fn partial_config_appliances_only() {
    let config = GatewatchConfig::parse(
        r#"
[[appliances]]
id = "edge"
port = 6514
"#,
    )
    .expect("should parse");

    config.validate().expect("should validate");
    assert_eq!(config.appliances.len(), 1);
    assert_eq!(config.appliances[0].name, "");
    assert_eq!(config.appliances[0].max_logs, None);
    assert_eq!(config.collector.stats_interval_secs, 5);
}

#[test]
fn partial_config_metrics_only() {
    let config = GatewatchConfig::parse(
        r#"
[metrics]
enabled = true
port = 9300
"#,
    )
    .expect("should parse");

    assert!(config.metrics.enabled);
    assert_eq!(config.metrics.port, 9300);
    assert_eq!(config.metrics.listen_addr, "127.0.0.1");
}

// =============================================================================
// 환경변수 우선순위 테스트
// =============================================================================

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let toml = r#"
[general]
log_level = "info"
"#;

    let original = std::env::var("GATEWATCH_GENERAL_LOG_LEVEL").ok();
    // SAFETY: serial 테스트로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("GATEWATCH_GENERAL_LOG_LEVEL", "error");
    }

    let mut config = GatewatchConfig::parse(toml).expect("should parse");
    config.apply_env_overrides();
    let result = config.general.log_level.clone();

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("GATEWATCH_GENERAL_LOG_LEVEL", val),
            None => std::env::remove_var("GATEWATCH_GENERAL_LOG_LEVEL"),
        }
    }

    assert_eq!(result, "error");
}

#[test]
#[serial_test::serial]
fn env_override_numeric_field() {
    let original = std::env::var("GATEWATCH_COLLECTOR_STATS_INTERVAL_SECS").ok();
    // SAFETY: serial 테스트로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("GATEWATCH_COLLECTOR_STATS_INTERVAL_SECS", "30");
    }

    let mut config = GatewatchConfig::parse(EXAMPLE).expect("should parse");
    config.apply_env_overrides();
    let result = config.collector.stats_interval_secs;

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("GATEWATCH_COLLECTOR_STATS_INTERVAL_SECS", val),
            None => std::env::remove_var("GATEWATCH_COLLECTOR_STATS_INTERVAL_SECS"),
        }
    }

    assert_eq!(result, 30);
}

#[test]
#[serial_test::serial]
fn env_override_bool_field() {
    let original = std::env::var("GATEWATCH_METRICS_ENABLED").ok();
    // SAFETY: serial 테스트로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("GATEWATCH_METRICS_ENABLED", "true");
    }

    let mut config = GatewatchConfig::parse("").expect("should parse");
    config.apply_env_overrides();
    let result = config.metrics.enabled;

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("GATEWATCH_METRICS_ENABLED", val),
            None => std::env::remove_var("GATEWATCH_METRICS_ENABLED"),
        }
    }

    assert!(result);
}

#[test]
#[serial_test::serial]
fn env_override_invalid_number_keeps_toml_value() {
    let original = std::env::var("GATEWATCH_COLLECTOR_MAX_LOGS").ok();
    // SAFETY: serial 테스트로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("GATEWATCH_COLLECTOR_MAX_LOGS", "lots");
    }

    let mut config = GatewatchConfig::parse("[collector]\nmax_logs = 42").expect("should parse");
    config.apply_env_overrides();
    let result = config.collector.max_logs;

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("GATEWATCH_COLLECTOR_MAX_LOGS", val),
            None => std::env::remove_var("GATEWATCH_COLLECTOR_MAX_LOGS"),
        }
    }

    assert_eq!(result, 42);
}

// =============================================================================
// 빈 파일 / 잘못된 형식 에러 테스트
// =============================================================================

#[test]
fn empty_string_parses_with_defaults() {
    let config = GatewatchConfig::parse("").expect("empty should parse");
    config.validate().expect("defaults should validate");
    assert_eq!(config.appliances[0].port, 5514);
}

#[test]
fn comments_only_parses_with_defaults() {
    let config = GatewatchConfig::parse("# nothing here\n# really\n").expect("should parse");
    assert_eq!(config.general.log_level, "info");
}

#[test]
fn malformed_toml_returns_parse_error() {
    let result = GatewatchConfig::parse("[collector\nmax_logs = 1");
    assert!(matches!(
        result,
        Err(GatewatchError::Config(ConfigError::ParseFailed { .. }))
    ));
}

#[test]
fn wrong_type_for_numeric_field() {
    let result = GatewatchConfig::parse("[collector]\nmax_logs = \"many\"");
    assert!(matches!(
        result,
        Err(GatewatchError::Config(ConfigError::ParseFailed { .. }))
    ));
}

#[test]
fn appliance_without_port_is_rejected() {
    let result = GatewatchConfig::parse("[[appliances]]\nid = \"no-port\"");
    assert!(result.is_err());
}

#[test]
fn unknown_section_is_ignored() {
    let config = GatewatchConfig::parse(
        r#"
[dashboard]
theme = "dark"

[general]
log_level = "warn"
"#,
    )
    .expect("unknown sections should be ignored");
    assert_eq!(config.general.log_level, "warn");
}

#[tokio::test]
async fn from_file_nonexistent_returns_file_not_found() {
    let result = GatewatchConfig::from_file("/tmp/gatewatch_test_nonexistent_12345.toml").await;
    assert!(matches!(
        result,
        Err(GatewatchError::Config(ConfigError::FileNotFound { .. }))
    ));
}

#[tokio::test]
async fn from_file_rejects_invalid_values() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    writeln!(file, "[collector]\nstats_interval_secs = 0").expect("write");

    let result = GatewatchConfig::from_file(file.path()).await;
    assert!(matches!(
        result,
        Err(GatewatchError::Config(ConfigError::InvalidValue { .. }))
    ));
}

#[tokio::test]
async fn load_example_config_from_disk() {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let example_path = format!("{manifest_dir}/../../gatewatch.toml.example");

    let config = GatewatchConfig::from_file(&example_path)
        .await
        .expect("example config should load");
    assert_eq!(config.appliances.len(), 2);
    assert!(config.appliance("fg60f-17th").is_some());
}

// =============================================================================
// 직렬화 라운드트립 테스트
// =============================================================================

#[test]
fn example_config_serialize_roundtrip() {
    let config = GatewatchConfig::parse(EXAMPLE).expect("should parse");
    let serialized = toml::to_string_pretty(&config).expect("should serialize");
    let reparsed = GatewatchConfig::parse(&serialized).expect("should reparse");

    assert_eq!(config.appliances, reparsed.appliances);
    assert_eq!(config.collector.max_logs, reparsed.collector.max_logs);
    assert_eq!(config.metrics.endpoint, reparsed.metrics.endpoint);
}
