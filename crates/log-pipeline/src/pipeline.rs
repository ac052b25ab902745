//! 어플라이언스별 파이프라인 -- 수집기, 집계기, 브로드캐스터를 하나의 생명주기로 묶습니다.
//!
//! [`FirewallPipeline`]은 core의 [`Pipeline`](gatewatch_core::pipeline::Pipeline) trait을 구현하여
//! `gatewatch-daemon`에서 어플라이언스마다 하나씩 독립적으로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! UDP -> FirewallCollector -> Dispatcher -+-> LogAggregator --(stats task)--+
//!                                          +-> EventBroadcaster <------------+
//!                                          +-> 추가 옵저버
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use gatewatch_core::error::{GatewatchError, PipelineError};
use gatewatch_core::pipeline::{HealthStatus, Pipeline, RecordObserver};

use crate::aggregator::LogAggregator;
use crate::broadcast::{DashboardEvent, EventBroadcaster};
use crate::collector::{CollectorStats, FirewallCollector};
use crate::config::PipelineConfig;
use crate::error::LogPipelineError;
use crate::parser::KeyValueParser;

/// 파이프라인 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
    /// 시작 실패 (바인드 에러 등)
    Failed(String),
}

/// 어플라이언스 하나의 수집/집계 파이프라인
///
/// # 사용 예시
/// ```ignore
/// use gatewatch_core::pipeline::Pipeline;
/// use gatewatch_log_pipeline::{FirewallPipelineBuilder, PipelineConfig};
///
/// let mut pipeline = FirewallPipelineBuilder::new()
///     .config(PipelineConfig::default())
///     .build()?;
/// pipeline.start().await?;
///
/// let mut events = pipeline.subscribe();
/// let snapshot = pipeline.aggregator().snapshot().await;
/// ```
pub struct FirewallPipeline {
    config: PipelineConfig,
    state: PipelineState,
    collector: FirewallCollector,
    aggregator: Arc<LogAggregator>,
    broadcaster: Arc<EventBroadcaster>,
    /// start 때 수집기에 등록할 추가 옵저버
    extra_observers: Vec<Arc<dyn RecordObserver>>,
    /// 옵저버 등록은 재시작해도 한 번만
    observers_attached: bool,
    stats_cancel: Option<CancellationToken>,
    stats_task: Option<JoinHandle<()>>,
}

impl FirewallPipeline {
    /// 어플라이언스 id
    pub fn firewall_id(&self) -> &str {
        &self.config.firewall_id
    }

    /// 표시용 이름
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// 파이프라인 설정
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 현재 상태 이름을 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
            PipelineState::Failed(_) => "failed",
        }
    }

    /// 실행 중인지 확인합니다.
    pub fn is_running(&self) -> bool {
        self.state == PipelineState::Running
    }

    /// 집계기 (recent, snapshot, reset 조회용)
    pub fn aggregator(&self) -> &Arc<LogAggregator> {
        &self.aggregator
    }

    /// 브로드캐스터
    pub fn broadcaster(&self) -> &Arc<EventBroadcaster> {
        &self.broadcaster
    }

    /// 대시보드 이벤트 스트림을 구독합니다.
    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.broadcaster.subscribe()
    }

    /// 수집기
    pub fn collector(&self) -> &FirewallCollector {
        &self.collector
    }

    /// 바인드된 주소 (실행 중일 때만)
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.collector.local_addr()
    }

    /// 수집기 카운터 스냅샷
    pub fn collector_stats(&self) -> CollectorStats {
        self.collector.stats()
    }

    async fn attach_observers(&mut self) {
        if self.observers_attached {
            return;
        }
        self.collector
            .subscribe(Arc::clone(&self.aggregator) as Arc<dyn RecordObserver>)
            .await;
        self.collector
            .subscribe(Arc::clone(&self.broadcaster) as Arc<dyn RecordObserver>)
            .await;
        for observer in &self.extra_observers {
            self.collector.subscribe(Arc::clone(observer)).await;
        }
        self.observers_attached = true;
    }

    fn spawn_stats_task(&mut self) {
        let token = CancellationToken::new();
        let task = tokio::spawn(run_stats_broadcast(
            self.config.firewall_id.clone(),
            self.config.stats_interval(),
            Arc::clone(&self.aggregator),
            Arc::clone(&self.broadcaster),
            token.clone(),
        ));
        self.stats_cancel = Some(token);
        self.stats_task = Some(task);
    }

    async fn stop_stats_task(&mut self) {
        if let Some(token) = self.stats_cancel.take() {
            token.cancel();
        }
        if let Some(task) = self.stats_task.take()
            && let Err(e) = task.await
        {
            warn!(firewall_id = %self.config.firewall_id, error = %e, "stats task ended abnormally");
        }
    }
}

impl Pipeline for FirewallPipeline {
    async fn start(&mut self) -> Result<(), GatewatchError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        info!(
            firewall_id = %self.config.firewall_id,
            name = %self.config.name,
            port = self.config.port,
            "starting firewall pipeline"
        );

        self.attach_observers().await;

        match self.collector.start().await {
            Ok(addr) => {
                self.spawn_stats_task();
                self.state = PipelineState::Running;
                info!(firewall_id = %self.config.firewall_id, addr = %addr, "firewall pipeline started");
                Ok(())
            }
            Err(e) => {
                warn!(firewall_id = %self.config.firewall_id, error = %e, "firewall pipeline failed to start");
                self.state = PipelineState::Failed(e.to_string());
                Err(e.into())
            }
        }
    }

    async fn stop(&mut self) -> Result<(), GatewatchError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!(firewall_id = %self.config.firewall_id, "stopping firewall pipeline");

        self.stop_stats_task().await;
        self.collector.stop().await;

        self.state = PipelineState::Stopped;
        info!(firewall_id = %self.config.firewall_id, "firewall pipeline stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match &self.state {
            PipelineState::Running if self.collector.is_receiving() => {
                match self.collector.unresolved_recv_error() {
                    Some(reason) => HealthStatus::Degraded(format!("udp receive error: {reason}")),
                    None => HealthStatus::Healthy,
                }
            }
            PipelineState::Running => HealthStatus::Unhealthy("receive loop exited".to_owned()),
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
            PipelineState::Failed(reason) => HealthStatus::Unhealthy(reason.clone()),
        }
    }
}

/// 주기적으로 순위 통계를 `stats_update`로 내보내는 태스크
///
/// 구독자가 없으면 스냅샷을 만들지 않습니다.
async fn run_stats_broadcast(
    firewall_id: String,
    period: std::time::Duration,
    aggregator: Arc<LogAggregator>,
    broadcaster: Arc<EventBroadcaster>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // 첫 tick은 즉시 완료됨
    ticker.tick().await;

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if !broadcaster.has_receivers() {
                    continue;
                }
                let snapshot = aggregator.snapshot().await;
                let delivered = broadcaster.publish_stats(snapshot);
                debug!(firewall_id = %firewall_id, delivered, "stats update published");
            }
        }
    }

    debug!(firewall_id = %firewall_id, "stats task exited");
}

/// 파이프라인 빌더
pub struct FirewallPipelineBuilder {
    config: PipelineConfig,
    observers: Vec<Arc<dyn RecordObserver>>,
}

impl FirewallPipelineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            observers: Vec::new(),
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 집계기와 브로드캐스터 외의 옵저버를 추가합니다.
    ///
    /// 영속 저장소 싱크 같은 외부 협력자를 여기에 연결합니다.
    pub fn observer(mut self, observer: Arc<dyn RecordObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// 파이프라인을 빌드합니다.
    pub fn build(self) -> Result<FirewallPipeline, LogPipelineError> {
        self.config.validate()?;

        let parser = KeyValueParser::new().with_max_input_size(self.config.max_input_size);
        let collector = FirewallCollector::new(self.config.collector_config(), parser);
        let aggregator = Arc::new(LogAggregator::new(
            self.config.firewall_id.clone(),
            self.config.max_logs,
        ));
        let broadcaster = Arc::new(EventBroadcaster::new(
            self.config.firewall_id.clone(),
            self.config.broadcast_capacity,
        ));

        Ok(FirewallPipeline {
            config: self.config,
            state: PipelineState::Initialized,
            collector,
            aggregator,
            broadcaster,
            extra_observers: self.observers,
            observers_attached: false,
            stats_cancel: None,
            stats_task: None,
        })
    }
}

impl Default for FirewallPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
