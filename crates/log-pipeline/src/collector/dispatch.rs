//! 레코드 디스패처 -- 파싱된 레코드를 옵저버별 큐로 전달합니다.
//!
//! 옵저버 하나당 bounded mpsc 큐와 워커 태스크 하나가 생깁니다.
//! 워커는 큐에서 레코드를 순서대로 꺼내 `handle`을 별도 태스크에서 실행하고 결과를 기다립니다.
//! 따라서 한 옵저버 안에서는 도착 순서가 유지되고, 에러나 패닉은 그 레코드 하나에 국한됩니다.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{RwLock, mpsc};
use tracing::{debug, error, warn};

use gatewatch_core::metrics as m;
use gatewatch_core::pipeline::RecordObserver;
use gatewatch_core::types::LogRecord;

use super::CollectorCounters;

/// 등록된 옵저버 하나
struct Subscriber {
    name: String,
    tx: mpsc::Sender<Arc<LogRecord>>,
}

/// 옵저버 디스패처
pub struct Dispatcher {
    firewall_id: String,
    queue_capacity: usize,
    counters: Arc<CollectorCounters>,
    subscribers: RwLock<Vec<Subscriber>>,
}

impl Dispatcher {
    /// 새 디스패처를 생성합니다.
    pub fn new(
        firewall_id: impl Into<String>,
        queue_capacity: usize,
        counters: Arc<CollectorCounters>,
    ) -> Self {
        Self {
            firewall_id: firewall_id.into(),
            queue_capacity: queue_capacity.max(1),
            counters,
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// 옵저버를 등록하고 워커 태스크를 시작합니다.
    ///
    /// tokio 런타임 안에서 호출해야 합니다.
    pub async fn subscribe(&self, observer: Arc<dyn RecordObserver>) {
        let name = observer.name().to_owned();
        let (tx, rx) = mpsc::channel(self.queue_capacity);

        tokio::spawn(run_worker(
            self.firewall_id.clone(),
            observer,
            rx,
            Arc::clone(&self.counters),
        ));

        debug!(
            firewall_id = %self.firewall_id,
            observer = %name,
            capacity = self.queue_capacity,
            "observer subscribed"
        );
        self.subscribers.write().await.push(Subscriber { name, tx });
    }

    /// 등록된 옵저버 수를 반환합니다.
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// 레코드를 모든 옵저버 큐에 넣습니다. 기다리지 않습니다.
    ///
    /// 큐가 가득 찬 옵저버에서는 레코드가 버려집니다.
    pub async fn dispatch(&self, record: Arc<LogRecord>) {
        let subscribers = self.subscribers.read().await;
        for sub in subscribers.iter() {
            match sub.tx.try_send(Arc::clone(&record)) {
                Ok(()) => {
                    self.counters.record_dispatched();
                    metrics::counter!(
                        m::COLLECTOR_RECORDS_DISPATCHED_TOTAL,
                        m::LABEL_FIREWALL => self.firewall_id.clone(),
                        m::LABEL_OBSERVER => sub.name.clone()
                    )
                    .increment(1);
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.counters.record_dropped();
                    metrics::counter!(
                        m::COLLECTOR_DISPATCH_DROPPED_TOTAL,
                        m::LABEL_FIREWALL => self.firewall_id.clone(),
                        m::LABEL_OBSERVER => sub.name.clone()
                    )
                    .increment(1);
                    warn!(
                        firewall_id = %self.firewall_id,
                        observer = %sub.name,
                        capacity = self.queue_capacity,
                        "observer queue full, record dropped"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    self.counters.record_dropped();
                    warn!(
                        firewall_id = %self.firewall_id,
                        observer = %sub.name,
                        "observer worker gone, record dropped"
                    );
                }
            }
        }
    }
}

/// 옵저버 하나의 큐를 처리하는 워커
///
/// 송신측이 모두 닫히면 남은 레코드를 처리한 뒤 종료합니다.
async fn run_worker(
    firewall_id: String,
    observer: Arc<dyn RecordObserver>,
    mut rx: mpsc::Receiver<Arc<LogRecord>>,
    counters: Arc<CollectorCounters>,
) {
    let name = observer.name().to_owned();

    while let Some(record) = rx.recv().await {
        let started = Instant::now();
        let task_observer = Arc::clone(&observer);
        let result = tokio::spawn(async move { task_observer.handle(record).await }).await;

        metrics::histogram!(
            m::COLLECTOR_OBSERVER_DURATION_SECONDS,
            m::LABEL_OBSERVER => name.clone()
        )
        .record(started.elapsed().as_secs_f64());

        match result {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => {
                warn!(firewall_id = %firewall_id, observer = %name, error = %e, "observer failed");
            }
            Err(join_err) if join_err.is_panic() => {
                error!(firewall_id = %firewall_id, observer = %name, "observer panicked");
            }
            Err(join_err) => {
                warn!(firewall_id = %firewall_id, observer = %name, error = %join_err, "observer task cancelled");
            }
        }

        counters.record_observer_error();
        metrics::counter!(
            m::COLLECTOR_OBSERVER_ERRORS_TOTAL,
            m::LABEL_FIREWALL => firewall_id.clone(),
            m::LABEL_OBSERVER => name.clone()
        )
        .increment(1);
    }

    debug!(firewall_id = %firewall_id, observer = %name, "observer worker exited");
}
