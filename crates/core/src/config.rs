//! 설정 관리 -- gatewatch.toml 파싱 및 런타임 설정
//!
//! [`GatewatchConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`GATEWATCH_COLLECTOR_MAX_LOGS=5000` 형식)
//! 3. 설정 파일 (`gatewatch.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), gatewatch_core::error::GatewatchError> {
//! use gatewatch_core::config::GatewatchConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = GatewatchConfig::load("gatewatch.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = GatewatchConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, GatewatchError};

/// 버퍼/채널 용량 상한
const MAX_CAPACITY: usize = 1_000_000;
/// 통계 브로드캐스트 주기 상한 (1시간)
const MAX_STATS_INTERVAL_SECS: u64 = 3600;

/// gatewatch 통합 설정
///
/// `gatewatch.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewatchConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 수집기/집계기 공통 설정
    #[serde(default)]
    pub collector: CollectorSettings,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// 모니터링 대상 어플라이언스 목록
    #[serde(default = "default_appliances")]
    pub appliances: Vec<ApplianceConfig>,
}

impl Default for GatewatchConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            collector: CollectorSettings::default(),
            metrics: MetricsConfig::default(),
            appliances: default_appliances(),
        }
    }
}

impl GatewatchConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, GatewatchError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, GatewatchError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GatewatchError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                GatewatchError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, GatewatchError> {
        toml::from_str(toml_str).map_err(|e| {
            GatewatchError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `GATEWATCH_{SECTION}_{FIELD}`
    /// 어플라이언스 목록은 환경변수로 오버라이드하지 않습니다.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "GATEWATCH_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "GATEWATCH_GENERAL_LOG_FORMAT");

        // Collector
        override_string(
            &mut self.collector.bind_host,
            "GATEWATCH_COLLECTOR_BIND_HOST",
        );
        override_usize(&mut self.collector.max_logs, "GATEWATCH_COLLECTOR_MAX_LOGS");
        override_usize(
            &mut self.collector.max_datagram_size,
            "GATEWATCH_COLLECTOR_MAX_DATAGRAM_SIZE",
        );
        override_usize(
            &mut self.collector.dispatch_queue_capacity,
            "GATEWATCH_COLLECTOR_DISPATCH_QUEUE_CAPACITY",
        );
        override_u64(
            &mut self.collector.stats_interval_secs,
            "GATEWATCH_COLLECTOR_STATS_INTERVAL_SECS",
        );
        override_usize(
            &mut self.collector.broadcast_capacity,
            "GATEWATCH_COLLECTOR_BROADCAST_CAPACITY",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "GATEWATCH_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "GATEWATCH_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "GATEWATCH_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), GatewatchError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.collector.bind_host.parse::<IpAddr>().is_err() {
            return Err(invalid(
                "collector.bind_host",
                format!("'{}' is not an IP address", self.collector.bind_host),
            ));
        }

        check_capacity("collector.max_logs", self.collector.max_logs)?;
        check_capacity(
            "collector.dispatch_queue_capacity",
            self.collector.dispatch_queue_capacity,
        )?;
        check_capacity(
            "collector.broadcast_capacity",
            self.collector.broadcast_capacity,
        )?;

        if self.collector.max_datagram_size == 0 || self.collector.max_datagram_size > 65535 {
            return Err(invalid("collector.max_datagram_size", "must be 1-65535"));
        }

        if self.collector.stats_interval_secs == 0
            || self.collector.stats_interval_secs > MAX_STATS_INTERVAL_SECS
        {
            return Err(invalid(
                "collector.stats_interval_secs",
                format!("must be 1-{MAX_STATS_INTERVAL_SECS}"),
            ));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid("metrics.port", "must be greater than 0"));
        }

        if self.appliances.is_empty() {
            return Err(invalid(
                "appliances",
                "at least one appliance must be configured",
            ));
        }

        let mut ids = HashSet::new();
        let mut ports = HashSet::new();
        for appliance in &self.appliances {
            if appliance.id.trim().is_empty() {
                return Err(invalid("appliances.id", "must not be empty"));
            }
            if !ids.insert(appliance.id.as_str()) {
                return Err(invalid(
                    "appliances.id",
                    format!("duplicate appliance id '{}'", appliance.id),
                ));
            }
            if appliance.port == 0 {
                return Err(invalid(
                    "appliances.port",
                    format!("appliance '{}' must use a non-zero port", appliance.id),
                ));
            }
            if !ports.insert(appliance.port) {
                return Err(invalid(
                    "appliances.port",
                    format!(
                        "port {} is used by more than one appliance",
                        appliance.port
                    ),
                ));
            }
            if let Some(max_logs) = appliance.max_logs {
                check_capacity("appliances.max_logs", max_logs)?;
            }
        }

        Ok(())
    }

    /// id로 어플라이언스 설정을 조회합니다.
    pub fn appliance(&self, id: &str) -> Option<&ApplianceConfig> {
        self.appliances.iter().find(|a| a.id == id)
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> GatewatchError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

fn check_capacity(field: &str, value: usize) -> Result<(), GatewatchError> {
    if value == 0 || value > MAX_CAPACITY {
        return Err(invalid(field, format!("must be 1-{MAX_CAPACITY}")));
    }
    Ok(())
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 수집기/집계기 공통 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorSettings {
    /// UDP 수신 바인드 호스트
    pub bind_host: String,
    /// 어플라이언스별 최근 로그 링 버퍼 용량
    pub max_logs: usize,
    /// 최대 데이터그램 크기 (바이트)
    pub max_datagram_size: usize,
    /// 옵저버별 디스패치 큐 용량
    pub dispatch_queue_capacity: usize,
    /// 통계 스냅샷 브로드캐스트 주기 (초)
    pub stats_interval_secs: u64,
    /// 대시보드 이벤트 브로드캐스트 채널 용량
    pub broadcast_capacity: usize,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_owned(),
            max_logs: 1000,
            max_datagram_size: 65535,
            dispatch_queue_capacity: 1024,
            stats_interval_secs: 5,
            broadcast_capacity: 256,
        }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 리스닝 주소
    pub listen_addr: String,
    /// 리스닝 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

/// 모니터링 대상 어플라이언스 설정
///
/// 어플라이언스마다 전용 UDP 포트를 가집니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplianceConfig {
    /// 고유 식별자 (예: `"fg60f-30th"`)
    pub id: String,
    /// 표시 이름
    #[serde(default)]
    pub name: String,
    /// UDP 수신 포트
    pub port: u16,
    /// 링 버퍼 용량 오버라이드 (없으면 `collector.max_logs`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_logs: Option<usize>,
}

fn default_appliances() -> Vec<ApplianceConfig> {
    vec![ApplianceConfig {
        id: "fortigate".to_owned(),
        name: "FortiGate".to_owned(),
        port: 5514,
        max_logs: None,
    }]
}

impl Default for ApplianceConfig {
    fn default() -> Self {
        default_appliances().remove(0)
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
