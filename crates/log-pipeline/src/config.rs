//! 로그 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 [`GatewatchConfig`]와 어플라이언스 항목 하나를
//! 합쳐서 어플라이언스 전용 파이프라인 설정을 만듭니다.
//!
//! # 사용 예시
//! ```ignore
//! use gatewatch_core::config::GatewatchConfig;
//! use gatewatch_log_pipeline::config::PipelineConfig;
//!
//! let core_config = GatewatchConfig::default();
//! let config = PipelineConfig::for_appliance(&core_config, &core_config.appliances[0]);
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use gatewatch_core::config::{ApplianceConfig, GatewatchConfig};
use serde::{Deserialize, Serialize};

use crate::collector::CollectorConfig;
use crate::error::LogPipelineError;
use crate::parser::DEFAULT_MAX_INPUT_SIZE;

/// 버퍼/채널 용량 상한
const MAX_CAPACITY: usize = 1_000_000;
/// 통계 주기 상한 (1시간)
const MAX_STATS_INTERVAL_SECS: u64 = 3600;

/// 어플라이언스 하나의 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// 어플라이언스 id (대시보드 이벤트의 `firewall_id`)
    pub firewall_id: String,
    /// 표시 이름
    pub name: String,
    /// UDP 바인드 호스트
    pub bind_host: IpAddr,
    /// UDP 포트 (0이면 OS가 임의 포트를 할당)
    pub port: u16,
    /// 최근 로그 링 버퍼 용량
    pub max_logs: usize,
    /// 최대 데이터그램 크기 (바이트)
    pub max_datagram_size: usize,
    /// 파서 최대 입력 크기 (바이트, 초과분은 잘림)
    pub max_input_size: usize,
    /// 옵저버별 디스패치 큐 용량
    pub dispatch_queue_capacity: usize,
    /// 통계 스냅샷 브로드캐스트 주기 (초)
    pub stats_interval_secs: u64,
    /// 대시보드 이벤트 채널 용량
    pub broadcast_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            firewall_id: "fortigate".to_owned(),
            name: "FortiGate".to_owned(),
            bind_host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 5514,
            max_logs: 1000,
            max_datagram_size: 65535,
            max_input_size: DEFAULT_MAX_INPUT_SIZE,
            dispatch_queue_capacity: 1024,
            stats_interval_secs: 5,
            broadcast_capacity: 256,
        }
    }
}

impl PipelineConfig {
    /// core 설정과 어플라이언스 항목에서 파이프라인 설정을 생성합니다.
    ///
    /// 어플라이언스의 `max_logs`가 있으면 공통 값보다 우선합니다.
    /// `bind_host`는 core 검증을 통과했다고 가정하며, 해석할 수 없으면 `0.0.0.0`을 씁니다.
    pub fn for_appliance(core: &GatewatchConfig, appliance: &ApplianceConfig) -> Self {
        let collector = &core.collector;
        let bind_host = collector.bind_host.parse().unwrap_or_else(|_| {
            tracing::warn!(
                bind_host = collector.bind_host.as_str(),
                "invalid bind host, falling back to 0.0.0.0"
            );
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        });

        Self {
            firewall_id: appliance.id.clone(),
            name: appliance.name.clone(),
            bind_host,
            port: appliance.port,
            max_logs: appliance.max_logs.unwrap_or(collector.max_logs),
            max_datagram_size: collector.max_datagram_size,
            dispatch_queue_capacity: collector.dispatch_queue_capacity,
            stats_interval_secs: collector.stats_interval_secs,
            broadcast_capacity: collector.broadcast_capacity,
            ..Self::default()
        }
    }

    /// 바인드 소켓 주소를 반환합니다.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_host, self.port)
    }

    /// 통계 브로드캐스트 주기를 반환합니다.
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }

    /// 수집기 설정을 파생합니다.
    pub fn collector_config(&self) -> CollectorConfig {
        CollectorConfig {
            firewall_id: self.firewall_id.clone(),
            bind_addr: self.bind_addr(),
            max_datagram_size: self.max_datagram_size,
            queue_capacity: self.dispatch_queue_capacity,
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        if self.firewall_id.trim().is_empty() {
            return Err(LogPipelineError::Config {
                field: "firewall_id".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        for (field, value) in [
            ("max_logs", self.max_logs),
            ("dispatch_queue_capacity", self.dispatch_queue_capacity),
            ("broadcast_capacity", self.broadcast_capacity),
        ] {
            if value == 0 || value > MAX_CAPACITY {
                return Err(LogPipelineError::Config {
                    field: field.to_owned(),
                    reason: format!("must be 1-{MAX_CAPACITY}"),
                });
            }
        }

        if self.max_datagram_size == 0 || self.max_datagram_size > 65535 {
            return Err(LogPipelineError::Config {
                field: "max_datagram_size".to_owned(),
                reason: "must be 1-65535".to_owned(),
            });
        }

        if self.max_input_size == 0 {
            return Err(LogPipelineError::Config {
                field: "max_input_size".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.stats_interval_secs == 0 || self.stats_interval_secs > MAX_STATS_INTERVAL_SECS {
            return Err(LogPipelineError::Config {
                field: "stats_interval_secs".to_owned(),
                reason: format!("must be 1-{MAX_STATS_INTERVAL_SECS}"),
            });
        }

        Ok(())
    }
}

/// 파이프라인 설정 빌더
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 어플라이언스 id를 설정합니다.
    pub fn firewall_id(mut self, id: impl Into<String>) -> Self {
        self.config.firewall_id = id.into();
        self
    }

    /// 표시 이름을 설정합니다.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// 바인드 호스트를 설정합니다.
    pub fn bind_host(mut self, host: IpAddr) -> Self {
        self.config.bind_host = host;
        self
    }

    /// UDP 포트를 설정합니다.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// 링 버퍼 용량을 설정합니다.
    pub fn max_logs(mut self, max_logs: usize) -> Self {
        self.config.max_logs = max_logs;
        self
    }

    /// 최대 데이터그램 크기를 설정합니다.
    pub fn max_datagram_size(mut self, size: usize) -> Self {
        self.config.max_datagram_size = size;
        self
    }

    /// 파서 최대 입력 크기를 설정합니다.
    pub fn max_input_size(mut self, size: usize) -> Self {
        self.config.max_input_size = size;
        self
    }

    /// 디스패치 큐 용량을 설정합니다.
    pub fn dispatch_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.dispatch_queue_capacity = capacity;
        self
    }

    /// 통계 브로드캐스트 주기(초)를 설정합니다.
    pub fn stats_interval_secs(mut self, secs: u64) -> Self {
        self.config.stats_interval_secs = secs;
        self
    }

    /// 대시보드 이벤트 채널 용량을 설정합니다.
    pub fn broadcast_capacity(mut self, capacity: usize) -> Self {
        self.config.broadcast_capacity = capacity;
        self
    }

    /// 설정을 검증하고 `PipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, LogPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn for_appliance_merges_shared_and_per_appliance_values() {
        let core = GatewatchConfig::parse(
            r#"
[collector]
bind_host = "127.0.0.1"
max_logs = 300

[[appliances]]
id = "fg60f-30th"
name = "30th"
port = 5514

[[appliances]]
id = "fg60f-17th"
port = 5515
max_logs = 50
"#,
        )
        .unwrap();

        let first = PipelineConfig::for_appliance(&core, &core.appliances[0]);
        assert_eq!(first.firewall_id, "fg60f-30th");
        assert_eq!(first.bind_addr().to_string(), "127.0.0.1:5514");
        assert_eq!(first.max_logs, 300);

        let second = PipelineConfig::for_appliance(&core, &core.appliances[1]);
        assert_eq!(second.port, 5515);
        // 어플라이언스별 용량이 우선
        assert_eq!(second.max_logs, 50);
        second.validate().unwrap();
    }

    #[test]
    fn collector_config_follows_pipeline_config() {
        let config = PipelineConfigBuilder::new()
            .firewall_id("edge")
            .port(0)
            .dispatch_queue_capacity(8)
            .build()
            .unwrap();
        let collector = config.collector_config();
        assert_eq!(collector.firewall_id, "edge");
        assert_eq!(collector.bind_addr.port(), 0);
        assert_eq!(collector.queue_capacity, 8);
    }

    #[test]
    fn validate_rejects_zero_max_logs() {
        let config = PipelineConfig {
            max_logs: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_logs"));
    }

    #[test]
    fn validate_rejects_oversized_datagram() {
        let result = PipelineConfigBuilder::new()
            .max_datagram_size(70_000)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn validate_rejects_empty_firewall_id() {
        let result = PipelineConfigBuilder::new().firewall_id("  ").build();
        assert!(result.is_err());
    }

    #[test]
    fn builder_creates_valid_config() {
        let config = PipelineConfigBuilder::new()
            .firewall_id("lab")
            .name("Lab FW")
            .bind_host(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .port(0)
            .max_logs(10)
            .stats_interval_secs(1)
            .broadcast_capacity(4)
            .max_input_size(1024)
            .build()
            .unwrap();
        assert_eq!(config.max_logs, 10);
        assert_eq!(config.stats_interval(), Duration::from_secs(1));
        assert_eq!(config.max_input_size, 1024);
    }
}
