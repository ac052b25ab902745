//! 대시보드 이벤트 브로드캐스터
//!
//! 파싱된 레코드와 주기적 통계를 `tokio::sync::broadcast` 채널로 내보냅니다.
//! 구독자가 없으면 아무것도 만들지 않습니다. 느린 구독자는 `Lagged`로 뒤처진 이벤트를 잃습니다.
//!
//! JSON 형태:
//! ```text
//! {"type": "log" | "stats_update", "firewall_id": ..., "timestamp": ..., "data": ...}
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use gatewatch_core::error::GatewatchError;
use gatewatch_core::metrics as m;
use gatewatch_core::pipeline::{BoxFuture, RecordObserver};
use gatewatch_core::types::LogRecord;

use crate::aggregator::{BlockedCategoryDetail, BlockedSiteDetail, StatsSnapshot};

/// 대시보드로 푸시되는 이벤트
#[derive(Debug, Clone, Serialize)]
pub struct DashboardEvent {
    /// 어플라이언스 id
    pub firewall_id: String,
    /// 이벤트 생성 시각
    pub timestamp: DateTime<Utc>,
    /// 이벤트 종류와 내용
    #[serde(flatten)]
    pub payload: DashboardPayload,
}

/// 이벤트 내용 (`type` 태그와 `data` 본문)
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum DashboardPayload {
    /// 새 레코드 하나
    Log(Arc<LogRecord>),
    /// 순위 통계 갱신
    StatsUpdate(RankingUpdate),
}

impl DashboardPayload {
    /// 메트릭 레이블로 쓰는 이벤트 종류
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Log(_) => "log",
            Self::StatsUpdate(_) => "stats_update",
        }
    }
}

/// `stats_update` 이벤트 본문 -- 스냅샷의 순위 부분
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RankingUpdate {
    /// 출발지 IP 상위 10개
    pub top_sources: Vec<(String, u64)>,
    /// 목적지(hostname 우선) 상위 10개
    pub top_destinations: Vec<(String, u64)>,
    /// 차단된 사이트 상위 10개
    pub top_blocked: Vec<(String, u64)>,
    /// 차단 카테고리 상위 10개
    pub top_blocked_categories: Vec<(String, u64)>,
    /// 차단 사이트별 출발지 상위 10개
    pub top_blocked_detail: Vec<BlockedSiteDetail>,
    /// 차단 카테고리별 (출발지, 목적지) 상위 10개
    pub top_blocked_categories_detail: Vec<BlockedCategoryDetail>,
}

impl From<StatsSnapshot> for RankingUpdate {
    fn from(snapshot: StatsSnapshot) -> Self {
        Self {
            top_sources: snapshot.top_sources,
            top_destinations: snapshot.top_destinations,
            top_blocked: snapshot.top_blocked,
            top_blocked_categories: snapshot.top_blocked_categories,
            top_blocked_detail: snapshot.top_blocked_detail,
            top_blocked_categories_detail: snapshot.top_blocked_categories_detail,
        }
    }
}

/// 어플라이언스 하나의 이벤트 브로드캐스터
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    firewall_id: String,
    tx: broadcast::Sender<DashboardEvent>,
}

impl EventBroadcaster {
    /// 채널 용량을 지정하여 새 브로드캐스터를 생성합니다.
    pub fn new(firewall_id: impl Into<String>, capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            firewall_id: firewall_id.into(),
            tx,
        }
    }

    /// 새 구독자를 등록합니다. 등록 이후의 이벤트만 받습니다.
    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.tx.subscribe()
    }

    /// 현재 구독자 수
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// 구독자가 있는지 확인합니다.
    pub fn has_receivers(&self) -> bool {
        self.tx.receiver_count() > 0
    }

    /// 이벤트를 보내고 받은 구독자 수를 반환합니다. 구독자가 없으면 0입니다.
    pub fn publish(&self, payload: DashboardPayload) -> usize {
        if !self.has_receivers() {
            return 0;
        }

        let kind = payload.kind();
        let event = DashboardEvent {
            firewall_id: self.firewall_id.clone(),
            timestamp: Utc::now(),
            payload,
        };

        match self.tx.send(event) {
            Ok(delivered) => {
                metrics::counter!(
                    m::BROADCASTER_EVENTS_PUBLISHED_TOTAL,
                    m::LABEL_FIREWALL => self.firewall_id.clone(),
                    m::LABEL_KIND => kind
                )
                .increment(1);
                trace!(firewall_id = %self.firewall_id, kind, delivered, "event published");
                delivered
            }
            // 검사와 전송 사이에 마지막 구독자가 떠난 경우
            Err(_) => 0,
        }
    }

    /// 스냅샷의 순위 부분을 `stats_update`로 보냅니다.
    pub fn publish_stats(&self, snapshot: StatsSnapshot) -> usize {
        self.publish(DashboardPayload::StatsUpdate(snapshot.into()))
    }
}

impl RecordObserver for EventBroadcaster {
    fn name(&self) -> &str {
        "broadcaster"
    }

    fn handle(&self, record: Arc<LogRecord>) -> BoxFuture<'_, Result<(), GatewatchError>> {
        Box::pin(async move {
            self.publish(DashboardPayload::Log(record));
            Ok(())
        })
    }
}
