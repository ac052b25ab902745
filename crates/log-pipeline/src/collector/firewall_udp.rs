//! 방화벽 UDP 수집기
//!
//! 어플라이언스 하나가 전용 UDP 포트로 보내는 `key=value` 로그를 수신합니다.
//! 각 데이터그램은 로그 한 줄로 취급합니다.
//!
//! 데이터그램마다: 어댑터 -> 파서 -> `source_ip` 부착 -> 디스패치

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use gatewatch_core::metrics as m;
use gatewatch_core::pipeline::RecordObserver;
use gatewatch_core::types::LogRecord;

use super::adapter::decode_datagram;
use super::dispatch::Dispatcher;
use super::{CollectorCounters, CollectorStats, CollectorStatus, Datagram};
use crate::error::LogPipelineError;
use crate::parser::KeyValueParser;

/// UDP 수집기 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 어플라이언스 id
    pub firewall_id: String,
    /// 바인드 주소 (포트 0이면 OS가 할당)
    pub bind_addr: SocketAddr,
    /// 최대 데이터그램 크기 (바이트, 초과분은 잘림)
    pub max_datagram_size: usize,
    /// 옵저버별 디스패치 큐 용량
    pub queue_capacity: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            firewall_id: "fortigate".to_owned(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5514)),
            max_datagram_size: 65535,
            queue_capacity: 1024,
        }
    }
}

/// 수신 루프가 데이터그램마다 사용하는 공유 상태
struct Ingest {
    firewall_id: String,
    parser: KeyValueParser,
    dispatcher: Arc<Dispatcher>,
    counters: Arc<CollectorCounters>,
}

impl Ingest {
    async fn ingest(&self, datagram: &Datagram) {
        self.counters.record_datagram(datagram.data.len());
        metrics::counter!(
            m::COLLECTOR_DATAGRAMS_RECEIVED_TOTAL,
            m::LABEL_FIREWALL => self.firewall_id.clone()
        )
        .increment(1);
        metrics::counter!(
            m::COLLECTOR_BYTES_RECEIVED_TOTAL,
            m::LABEL_FIREWALL => self.firewall_id.clone()
        )
        .increment(datagram.data.len() as u64);

        let record = self.build_record(datagram);
        debug!(
            firewall_id = %self.firewall_id,
            peer = %datagram.peer,
            category = %record.log_category,
            "record parsed"
        );
        self.dispatcher.dispatch(Arc::new(record)).await;
    }

    fn build_record(&self, datagram: &Datagram) -> LogRecord {
        let line = decode_datagram(&datagram.data);
        self.parser
            .parse_at(&line, datagram.received_at)
            .with_source_ip(datagram.peer.ip().to_string())
    }
}

/// 방화벽 UDP 수집기
///
/// `start()`로 소켓을 바인드하고 수신 루프를 스폰하며, `stop()`으로 중단합니다.
/// 등록된 옵저버는 정지/재시작 후에도 유지됩니다.
pub struct FirewallCollector {
    config: CollectorConfig,
    ingest: Arc<Ingest>,
    status: CollectorStatus,
    cancel_token: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl FirewallCollector {
    /// 새 수집기를 생성합니다.
    pub fn new(config: CollectorConfig, parser: KeyValueParser) -> Self {
        let counters = Arc::new(CollectorCounters::default());
        let dispatcher = Arc::new(Dispatcher::new(
            config.firewall_id.clone(),
            config.queue_capacity,
            Arc::clone(&counters),
        ));
        let ingest = Arc::new(Ingest {
            firewall_id: config.firewall_id.clone(),
            parser,
            dispatcher,
            counters,
        });

        Self {
            config,
            ingest,
            status: CollectorStatus::Idle,
            cancel_token: None,
            task: None,
            local_addr: None,
        }
    }

    /// 옵저버를 등록합니다.
    ///
    /// 모든 옵저버는 같은 `Arc<LogRecord>`를 받습니다.
    pub async fn subscribe(&self, observer: Arc<dyn RecordObserver>) {
        self.ingest.dispatcher.subscribe(observer).await;
    }

    /// 소켓을 바인드하고 수신 루프를 시작합니다.
    ///
    /// 실제로 바인드된 주소를 반환합니다.
    pub async fn start(&mut self) -> Result<SocketAddr, LogPipelineError> {
        if self.status == CollectorStatus::Running {
            return Err(LogPipelineError::AlreadyRunning);
        }

        let bind_addr = self.config.bind_addr;
        let socket = match UdpSocket::bind(bind_addr).await {
            Ok(socket) => socket,
            Err(e) => {
                self.status = CollectorStatus::Error(e.to_string());
                return Err(LogPipelineError::Bind {
                    addr: bind_addr.to_string(),
                    source: e,
                });
            }
        };
        let local_addr = socket.local_addr()?;

        let cancel = CancellationToken::new();
        let task = tokio::spawn(receive_loop(
            socket,
            Arc::clone(&self.ingest),
            self.config.max_datagram_size,
            cancel.clone(),
        ));

        self.cancel_token = Some(cancel);
        self.task = Some(task);
        self.local_addr = Some(local_addr);
        self.status = CollectorStatus::Running;

        info!(
            firewall_id = %self.config.firewall_id,
            addr = %local_addr,
            "firewall collector listening"
        );
        Ok(local_addr)
    }

    /// 수신 루프를 중단하고 소켓을 해제합니다.
    ///
    /// 실행 중이 아니면 아무것도 하지 않습니다. 이미 큐에 들어간 레코드는 계속 처리됩니다.
    pub async fn stop(&mut self) {
        let Some(cancel) = self.cancel_token.take() else {
            return;
        };
        cancel.cancel();

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(
                    firewall_id = %self.config.firewall_id,
                    error = %e,
                    "receive loop ended abnormally"
                );
            }
        }

        self.local_addr = None;
        self.status = CollectorStatus::Stopped;
        info!(firewall_id = %self.config.firewall_id, "firewall collector stopped");
    }

    /// 바인드된 주소를 반환합니다. 실행 중이 아니면 `None`입니다.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// 현재 상태를 반환합니다.
    pub fn status(&self) -> &CollectorStatus {
        &self.status
    }

    /// 수신 루프 태스크가 살아 있는지 확인합니다.
    pub fn is_receiving(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// 설정을 반환합니다.
    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// 누적 통계를 반환합니다.
    pub fn stats(&self) -> CollectorStats {
        self.ingest.counters.snapshot()
    }

    /// 마지막 정상 수신 이후 이어지는 수신 에러가 있으면 그 메시지를 반환합니다.
    pub fn unresolved_recv_error(&self) -> Option<String> {
        self.ingest.counters.unresolved_recv_error()
    }

    #[cfg(test)]
    pub(crate) fn counters(&self) -> &CollectorCounters {
        &self.ingest.counters
    }

    /// 등록된 옵저버 수를 반환합니다.
    pub async fn subscriber_count(&self) -> usize {
        self.ingest.dispatcher.subscriber_count().await
    }

    /// 소켓 없이 데이터그램 하나를 처리합니다.
    ///
    /// 수신 루프와 같은 경로(어댑터, 파서, 디스패치)를 거칩니다.
    pub async fn ingest(&self, datagram: &Datagram) {
        self.ingest.ingest(datagram).await;
    }
}

impl Drop for FirewallCollector {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel_token.take() {
            cancel.cancel();
        }
    }
}

/// 취소될 때까지 데이터그램을 수신합니다.
///
/// 수신 에러는 로그와 카운터만 남기고 루프를 유지합니다.
async fn receive_loop(
    socket: UdpSocket,
    ingest: Arc<Ingest>,
    max_datagram_size: usize,
    cancel: CancellationToken,
) {
    let mut buf = vec![0u8; max_datagram_size.max(1)];

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(firewall_id = %ingest.firewall_id, "receive loop cancelled");
                break;
            }
            result = socket.recv_from(&mut buf) => {
                match result {
                    Ok((len, peer)) => {
                        let datagram = Datagram::new(
                            bytes::Bytes::copy_from_slice(&buf[..len]),
                            peer,
                        );
                        ingest.ingest(&datagram).await;
                    }
                    Err(e) => {
                        ingest.counters.record_recv_error(&e);
                        metrics::counter!(
                            m::COLLECTOR_RECV_ERRORS_TOTAL,
                            m::LABEL_FIREWALL => ingest.firewall_id.clone()
                        )
                        .increment(1);
                        warn!(firewall_id = %ingest.firewall_id, error = %e, "udp receive error");
                    }
                }
            }
        }
    }
}
