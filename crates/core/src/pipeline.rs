//! 파이프라인 trait -- 모듈 확장 포인트 정의
//!
//! - [`Pipeline`]: 시작/정지/헬스 체크 생명주기 (어플라이언스별 파이프라인이 구현)
//! - [`LogParser`]: 한 줄의 텍스트를 [`LogRecord`]로 변환
//! - [`RecordObserver`]: 수집기가 파싱한 레코드를 구독하는 비동기 핸들러

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;

use crate::error::GatewatchError;
use crate::types::LogRecord;

/// `Send` 가능한 boxed future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 모듈 건강 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 동작하지만 성능 저하 또는 부분 장애
    Degraded(String),
    /// 동작 불가
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 동작 불가 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

/// 파이프라인 생명주기 trait
///
/// 어플라이언스별 수집/집계 파이프라인이 구현합니다.
pub trait Pipeline: Send + Sync {
    /// 파이프라인을 시작합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), GatewatchError>> + Send;

    /// 파이프라인을 정지합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), GatewatchError>> + Send;

    /// 건강 상태를 확인합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// 로그 파서 trait
///
/// 네트워크 입력은 신뢰할 수 없으므로 파서는 실패하지 않습니다.
/// 해석할 수 없는 입력은 필드가 없는 최소 레코드가 됩니다.
pub trait LogParser: Send + Sync {
    /// 지원하는 로그 형식 이름
    fn format_name(&self) -> &str;

    /// 한 줄의 텍스트를 로그 레코드로 파싱
    fn parse(&self, line: &str) -> LogRecord;
}

/// 레코드 구독자 trait
///
/// 수집기는 파싱한 레코드마다 등록된 모든 옵저버의 `handle`을 한 번씩 호출합니다.
/// 한 옵저버의 에러는 로그로 남고 다른 옵저버나 수신 루프에 영향을 주지 않습니다.
pub trait RecordObserver: Send + Sync {
    /// 로그와 메트릭에 쓰이는 옵저버 이름
    fn name(&self) -> &str;

    /// 레코드 하나를 처리합니다.
    fn handle(&self, record: Arc<LogRecord>) -> BoxFuture<'_, Result<(), GatewatchError>>;
}
