//! 로그 파이프라인 에러 타입
//!
//! [`LogPipelineError`]는 수집기/파이프라인 내부에서 발생하는 에러를 표현합니다.
//! `From<LogPipelineError> for GatewatchError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.
//!
//! 파싱은 실패하지 않으므로 파싱 에러 variant는 없습니다.

use gatewatch_core::error::{GatewatchError, PipelineError};

/// 로그 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// UDP 소켓 바인드 실패 (해당 어플라이언스에만 치명적)
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// 바인드 시도 주소
        addr: String,
        /// 원인 I/O 에러
        #[source]
        source: std::io::Error,
    },

    /// 이미 실행 중인 수집기를 다시 시작
    #[error("collector already running")]
    AlreadyRunning,

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LogPipelineError> for GatewatchError {
    fn from(err: LogPipelineError) -> Self {
        match err {
            LogPipelineError::AlreadyRunning => {
                GatewatchError::Pipeline(PipelineError::AlreadyRunning)
            }
            LogPipelineError::Io(e) => GatewatchError::Io(e),
            other => GatewatchError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}
