#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`collector`]: UDP 수신, 전송 어댑터, 옵저버 디스패치
//! - [`parser`]: `key=value` 파서와 카테고리 분류기
//! - [`aggregator`]: 링 버퍼와 실시간 통계
//! - [`broadcast`]: 대시보드 이벤트 브로드캐스터
//! - [`pipeline`]: 어플라이언스별 파이프라인 (Pipeline trait 구현)
//! - [`config`]: 파이프라인 설정 (core 설정에서 파생)
//! - [`error`]: 도메인 에러 타입

pub mod aggregator;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod pipeline;

pub mod collector;
pub mod parser;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{FirewallPipeline, FirewallPipelineBuilder};

// 설정
pub use config::{PipelineConfig, PipelineConfigBuilder};

// 에러
pub use error::LogPipelineError;

// 파서
pub use parser::{KeyValueParser, categorize};

// 수집기
pub use collector::{CollectorConfig, CollectorStats, Datagram, FirewallCollector, decode_datagram};

// 집계기
pub use aggregator::{LogAggregator, StatsSnapshot};

// 브로드캐스터
pub use broadcast::{DashboardEvent, DashboardPayload, EventBroadcaster, RankingUpdate};
