//! 로그 집계기 -- 어플라이언스별 최근 로그 링 버퍼와 실시간 통계
//!
//! [`LogAggregator`]는 모든 연산을 하나의 `tokio::sync::Mutex`로 직렬화합니다.
//! `add` 도중의 `snapshot`은 일부만 반영된 상태를 볼 수 없습니다.
//! 잠금은 어플라이언스마다 독립적입니다.
//!
//! # 집계 규칙
//! - action 키: `action` 필드, 없으면 `"unknown"`
//! - 판정: [`Verdict`] (차단/허용/기타, 대소문자 무시)
//! - 목적지: [`destination_of`] (hostname 우선, 점 표기 IP면 dstip)
//! - 차단 사이트/카테고리: `type == "utm"`이고 차단 판정일 때만
//! - 카테고리 상세: `subtype == "webfilter"`이거나 `catdesc`가 있을 때만

pub mod rules;
pub mod stats;

pub use rules::{Verdict, destination_of, is_dotted_quad};
pub use stats::{
    BlockedCategory, BlockedCategoryDetail, BlockedSite, BlockedSiteDetail, CountTable,
    OrderedTable, StatsSnapshot, TOP_N,
};

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use gatewatch_core::error::GatewatchError;
use gatewatch_core::metrics as m;
use gatewatch_core::pipeline::{BoxFuture, RecordObserver};
use gatewatch_core::types::LogRecord;

use crate::parser::category;

/// 잠금으로 보호되는 집계 상태
#[derive(Debug, Default)]
struct AggregatorState {
    buffer: VecDeque<Arc<LogRecord>>,
    total: u64,
    blocked: u64,
    allowed: u64,
    by_action: CountTable,
    by_source: CountTable,
    by_destination: CountTable,
    by_category: CountTable,
    blocked_sites: OrderedTable<BlockedSite>,
    blocked_categories: OrderedTable<BlockedCategory>,
}

impl AggregatorState {
    fn apply(&mut self, record: &LogRecord) -> Verdict {
        self.total += 1;

        let action = record.text("action");
        self.by_action
            .increment(action.as_deref().unwrap_or("unknown"));

        let verdict = Verdict::of(action.as_deref());
        match verdict {
            Verdict::Blocked => self.blocked += 1,
            Verdict::Allowed => self.allowed += 1,
            Verdict::Other => {}
        }

        let srcip = record.text("srcip");
        if let Some(src) = srcip.as_deref() {
            self.by_source.increment(src);
        }

        let destination = destination_of(record);
        if let Some(dest) = destination.as_deref() {
            self.by_destination.increment(dest);
        }

        let is_utm = record.text("type").as_deref() == Some("utm");
        if verdict == Verdict::Blocked && is_utm {
            self.track_blocked(record, srcip.as_deref(), destination.as_deref());
        }

        self.by_category.increment(&record.log_category);
        verdict
    }

    fn track_blocked(&mut self, record: &LogRecord, srcip: Option<&str>, site: Option<&str>) {
        if let Some(site) = site {
            let entry = self.blocked_sites.entry_mut(site);
            entry.hits += 1;
            if let Some(src) = srcip {
                entry.sources.increment(src);
            }
        }

        let catdesc = record.text("catdesc");
        let is_webfilter = record.text("subtype").as_deref() == Some("webfilter");
        if !is_webfilter && catdesc.is_none() {
            return;
        }

        let category = self
            .blocked_categories
            .entry_mut(catdesc.as_deref().unwrap_or("Other"));
        category.hits += 1;
        if let Some(src) = srcip {
            let dests = category.sources.entry_mut(src);
            if let Some(site) = site {
                dests.increment(site);
            }
        }
    }

    fn push(&mut self, record: Arc<LogRecord>, capacity: usize) {
        self.buffer.push_back(record);
        while self.buffer.len() > capacity {
            self.buffer.pop_front();
        }
    }

    fn snapshot(&self) -> StatsSnapshot {
        let top_blocked = self.blocked_sites.top_by(TOP_N, |s| s.hits);
        let top_categories = self.blocked_categories.top_by(TOP_N, |c| c.hits);

        StatsSnapshot {
            total_logs: self.total,
            blocked_count: self.blocked,
            allowed_count: self.allowed,
            by_action: self.by_action.to_map(),
            by_type: self.by_category.to_map(),
            top_sources: self.by_source.top(TOP_N),
            top_destinations: self.by_destination.top(TOP_N),
            top_blocked: top_blocked
                .iter()
                .map(|(site, s)| ((*site).to_owned(), s.hits))
                .collect(),
            top_blocked_categories: top_categories
                .iter()
                .map(|(cat, c)| ((*cat).to_owned(), c.hits))
                .collect(),
            top_blocked_detail: top_blocked
                .iter()
                .map(|(site, s)| BlockedSiteDetail {
                    site: (*site).to_owned(),
                    count: s.hits,
                    sources: s.sources.top(TOP_N),
                })
                .collect(),
            top_blocked_categories_detail: top_categories
                .iter()
                .map(|(cat, c)| BlockedCategoryDetail {
                    category: (*cat).to_owned(),
                    count: c.hits,
                    sources: c.top_triples(TOP_N),
                })
                .collect(),
        }
    }
}

/// 어플라이언스 하나의 로그 집계기
///
/// 반환되는 레코드는 `Arc`로 공유되는 불변 값이고, 스냅샷은 복사본입니다.
#[derive(Debug)]
pub struct LogAggregator {
    firewall_id: String,
    capacity: usize,
    state: Mutex<AggregatorState>,
}

impl LogAggregator {
    /// 링 버퍼 용량을 지정하여 새 집계기를 생성합니다.
    ///
    /// 용량 0은 1로 취급합니다.
    pub fn new(firewall_id: impl Into<String>, capacity: usize) -> Self {
        Self {
            firewall_id: firewall_id.into(),
            capacity: capacity.max(1),
            state: Mutex::new(AggregatorState::default()),
        }
    }

    /// 어플라이언스 id를 반환합니다.
    pub fn firewall_id(&self) -> &str {
        &self.firewall_id
    }

    /// 링 버퍼 용량을 반환합니다.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 레코드를 추가하고 모든 카운터를 갱신합니다. 실패하지 않습니다.
    pub async fn add(&self, record: Arc<LogRecord>) {
        let mut state = self.state.lock().await;
        let verdict = state.apply(&record);
        metrics::counter!(
            m::AGGREGATOR_RECORDS_TOTAL,
            m::LABEL_FIREWALL => self.firewall_id.clone(),
            m::LABEL_CATEGORY => category::metric_label(&record.log_category),
            m::LABEL_VERDICT => verdict.as_str()
        )
        .increment(1);
        state.push(record, self.capacity);
        metrics::gauge!(
            m::AGGREGATOR_BUFFER_SIZE,
            m::LABEL_FIREWALL => self.firewall_id.clone()
        )
        .set(state.buffer.len() as f64);
    }

    /// 가장 최근 `limit`개 레코드를 오래된 것부터 반환합니다.
    pub async fn recent(&self, limit: usize) -> Vec<Arc<LogRecord>> {
        let state = self.state.lock().await;
        let skip = state.buffer.len().saturating_sub(limit);
        state.buffer.iter().skip(skip).cloned().collect()
    }

    /// 현재 통계의 일관된 스냅샷을 반환합니다.
    pub async fn snapshot(&self) -> StatsSnapshot {
        self.state.lock().await.snapshot()
    }

    /// 모든 카운터와 링 버퍼를 원자적으로 비웁니다.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        let dropped = state.total;
        *state = AggregatorState::default();
        drop(state);

        metrics::counter!(
            m::AGGREGATOR_RESETS_TOTAL,
            m::LABEL_FIREWALL => self.firewall_id.clone()
        )
        .increment(1);
        metrics::gauge!(
            m::AGGREGATOR_BUFFER_SIZE,
            m::LABEL_FIREWALL => self.firewall_id.clone()
        )
        .set(0.0);
        info!(firewall_id = %self.firewall_id, cleared = dropped, "aggregator reset");
    }

    /// 링 버퍼에 보관 중인 레코드 수
    pub async fn len(&self) -> usize {
        self.state.lock().await.buffer.len()
    }

    /// 링 버퍼가 비어 있는지 확인합니다.
    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.buffer.is_empty()
    }
}

impl RecordObserver for LogAggregator {
    fn name(&self) -> &str {
        "aggregator"
    }

    fn handle(&self, record: Arc<LogRecord>) -> BoxFuture<'_, Result<(), GatewatchError>> {
        Box::pin(async move {
            self.add(record).await;
            Ok(())
        })
    }
}

impl Drop for LogAggregator {
    fn drop(&mut self) {
        debug!(firewall_id = %self.firewall_id, "aggregator dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gatewatch_core::pipeline::LogParser;
    use gatewatch_core::types::FieldValue;

    fn record(pairs: &[(&str, &str)]) -> Arc<LogRecord> {
        let mut record = LogRecord::new("", Utc::now());
        for (k, v) in pairs {
            record
                .fields
                .insert((*k).to_owned(), FieldValue::coerce(v));
        }
        Arc::new(record)
    }

    fn numbered(i: usize) -> Arc<LogRecord> {
        Arc::new(LogRecord::new(format!("seq={i}"), Utc::now()))
    }

    #[tokio::test]
    async fn counts_actions_and_verdicts() {
        let agg = LogAggregator::new("fw", 100);
        agg.add(record(&[("action", "deny")])).await;
        agg.add(record(&[("action", "ACCEPT")])).await;
        agg.add(record(&[("action", "close")])).await;
        agg.add(record(&[])).await;

        let snap = agg.snapshot().await;
        assert_eq!(snap.total_logs, 4);
        assert_eq!(snap.blocked_count, 1);
        assert_eq!(snap.allowed_count, 1);
        assert_eq!(snap.by_action["deny"], 1);
        assert_eq!(snap.by_action["ACCEPT"], 1);
        assert_eq!(snap.by_action["unknown"], 1);
        assert!(snap.blocked_count + snap.allowed_count <= snap.total_logs);
    }

    #[tokio::test]
    async fn empty_action_counts_as_unknown() {
        let agg = LogAggregator::new("fw", 100);
        agg.add(record(&[("action", "")])).await;
        let parsed = crate::parser::KeyValueParser::new().parse("type=traffic action=\"\"");
        agg.add(Arc::new(parsed)).await;
        agg.add(record(&[])).await;

        let snap = agg.snapshot().await;
        assert_eq!(snap.by_action.len(), 1);
        assert_eq!(snap.by_action["unknown"], 3);
        assert!(!snap.by_action.contains_key(""));
        assert_eq!(snap.blocked_count + snap.allowed_count, 0);
    }

    #[tokio::test]
    async fn ring_buffer_keeps_most_recent_in_order() {
        let agg = LogAggregator::new("fw", 5);
        for i in 0..8 {
            agg.add(numbered(i)).await;
        }

        assert_eq!(agg.len().await, 5);
        let recent = agg.recent(8).await;
        let raws: Vec<&str> = recent.iter().map(|r| r.raw.as_str()).collect();
        assert_eq!(raws, vec!["seq=3", "seq=4", "seq=5", "seq=6", "seq=7"]);

        let last_two = agg.recent(2).await;
        assert_eq!(last_two[0].raw, "seq=6");
        assert_eq!(last_two[1].raw, "seq=7");

        // 총계는 버퍼 용량과 무관
        assert_eq!(agg.snapshot().await.total_logs, 8);
    }

    #[tokio::test]
    async fn recent_zero_is_empty() {
        let agg = LogAggregator::new("fw", 5);
        agg.add(numbered(1)).await;
        assert!(agg.recent(0).await.is_empty());
    }

    #[tokio::test]
    async fn reset_clears_everything() {
        let agg = LogAggregator::new("fw", 10);
        agg.add(record(&[
            ("type", "utm"),
            ("subtype", "webfilter"),
            ("action", "blocked"),
            ("srcip", "10.0.0.5"),
            ("dstip", "1.2.3.4"),
        ]))
        .await;

        agg.reset().await;
        assert_eq!(agg.snapshot().await, StatsSnapshot::default());
        assert!(agg.recent(100).await.is_empty());
        assert!(agg.is_empty().await);
    }

    #[tokio::test]
    async fn destination_prefers_hostname() {
        let agg = LogAggregator::new("fw", 10);
        agg.add(record(&[("dstip", "8.8.8.8"), ("hostname", "ads.example.com")]))
            .await;
        agg.add(record(&[("dstip", "8.8.8.8"), ("hostname", "8.8.8.8")]))
            .await;

        let snap = agg.snapshot().await;
        assert_eq!(
            snap.top_destinations,
            vec![
                ("ads.example.com".to_owned(), 1),
                ("8.8.8.8".to_owned(), 1)
            ]
        );
    }

    #[tokio::test]
    async fn destination_skipped_when_absent() {
        let agg = LogAggregator::new("fw", 10);
        agg.add(record(&[("srcip", "10.0.0.1")])).await;
        let snap = agg.snapshot().await;
        assert!(snap.top_destinations.is_empty());
        assert_eq!(snap.top_sources, vec![("10.0.0.1".to_owned(), 1)]);
    }

    #[tokio::test]
    async fn utm_webfilter_block_tracks_category_detail() {
        let agg = LogAggregator::new("fw", 10);
        agg.add(record(&[
            ("type", "utm"),
            ("subtype", "webfilter"),
            ("action", "blocked"),
            ("catdesc", "Malicious Websites"),
            ("srcip", "10.0.0.5"),
            ("dstip", "1.2.3.4"),
        ]))
        .await;

        let snap = agg.snapshot().await;
        assert_eq!(
            snap.top_blocked_categories,
            vec![("Malicious Websites".to_owned(), 1)]
        );
        assert_eq!(
            snap.top_blocked_categories_detail[0].sources,
            vec![("10.0.0.5".to_owned(), "1.2.3.4".to_owned(), 1)]
        );
        assert_eq!(snap.top_blocked, vec![("1.2.3.4".to_owned(), 1)]);
        assert_eq!(
            snap.top_blocked_detail[0].sources,
            vec![("10.0.0.5".to_owned(), 1)]
        );
    }

    #[tokio::test]
    async fn webfilter_without_catdesc_uses_other() {
        let agg = LogAggregator::new("fw", 10);
        agg.add(record(&[
            ("type", "utm"),
            ("subtype", "webfilter"),
            ("action", "block"),
            ("hostname", "bad.example"),
        ]))
        .await;

        let snap = agg.snapshot().await;
        assert_eq!(snap.top_blocked_categories, vec![("Other".to_owned(), 1)]);
        // srcip가 없으면 카테고리 상세 항목은 비어 있다
        assert!(snap.top_blocked_categories_detail[0].sources.is_empty());
        assert_eq!(snap.top_blocked_detail[0].site, "bad.example");
        assert!(snap.top_blocked_detail[0].sources.is_empty());
    }

    #[tokio::test]
    async fn utm_block_without_category_hint_skips_category() {
        let agg = LogAggregator::new("fw", 10);
        agg.add(record(&[
            ("type", "utm"),
            ("subtype", "ips"),
            ("action", "dropped"),
            ("dstip", "9.9.9.9"),
        ]))
        .await;
        agg.add(record(&[
            ("type", "utm"),
            ("subtype", "virus"),
            ("action", "blocked"),
            ("dstip", "9.9.9.9"),
        ]))
        .await;

        let snap = agg.snapshot().await;
        // "dropped"는 차단 집합에 없음
        assert_eq!(snap.blocked_count, 1);
        assert_eq!(snap.top_blocked, vec![("9.9.9.9".to_owned(), 1)]);
        assert!(snap.top_blocked_categories.is_empty());
    }

    #[tokio::test]
    async fn traffic_deny_is_not_a_content_block() {
        let agg = LogAggregator::new("fw", 10);
        agg.add(record(&[
            ("type", "traffic"),
            ("action", "deny"),
            ("srcip", "10.0.0.5"),
            ("dstip", "8.8.8.8"),
        ]))
        .await;

        let snap = agg.snapshot().await;
        assert_eq!(snap.blocked_count, 1);
        assert!(snap.top_blocked.is_empty());
        assert!(snap.top_blocked_categories.is_empty());
        assert!(snap.top_blocked_detail.is_empty());
    }

    #[tokio::test]
    async fn rankings_break_ties_by_first_observation() {
        let agg = LogAggregator::new("fw", 100);
        for src in ["10.0.0.3", "10.0.0.1", "10.0.0.2", "10.0.0.1", "10.0.0.3"] {
            agg.add(record(&[("srcip", src)])).await;
        }
        let snap = agg.snapshot().await;
        assert_eq!(
            snap.top_sources,
            vec![
                ("10.0.0.3".to_owned(), 2),
                ("10.0.0.1".to_owned(), 2),
                ("10.0.0.2".to_owned(), 1),
            ]
        );
    }

    #[tokio::test]
    async fn rankings_are_limited_to_ten() {
        let agg = LogAggregator::new("fw", 100);
        for i in 0..15 {
            let src = format!("10.0.0.{i}");
            agg.add(record(&[("srcip", src.as_str())])).await;
        }
        let snap = agg.snapshot().await;
        assert_eq!(snap.top_sources.len(), TOP_N);
    }

    #[tokio::test]
    async fn by_type_counts_categories() {
        let agg = LogAggregator::new("fw", 10);
        let mut r = LogRecord::new("type=traffic subtype=forward", Utc::now());
        r.log_category = "traffic_forward".to_owned();
        agg.add(Arc::new(r.clone())).await;
        agg.add(Arc::new(r)).await;

        let snap = agg.snapshot().await;
        assert_eq!(snap.by_type["traffic_forward"], 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adds_lose_nothing() {
        let agg = Arc::new(LogAggregator::new("fw", 50));
        let mut handles = Vec::new();
        for t in 0..8 {
            let agg = Arc::clone(&agg);
            handles.push(tokio::spawn(async move {
                for i in 0..125 {
                    let src = format!("10.{t}.0.{i}");
                    agg.add(record(&[("srcip", src.as_str())])).await;
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let snap = agg.snapshot().await;
        assert_eq!(snap.total_logs, 1000);
        assert_eq!(agg.len().await, 50);
    }

    #[tokio::test]
    async fn observer_handle_adds_record() {
        let agg = LogAggregator::new("fw", 10);
        let observer: &dyn RecordObserver = &agg;
        observer.handle(record(&[("action", "deny")])).await.unwrap();
        assert_eq!(observer.name(), "aggregator");
        assert_eq!(agg.snapshot().await.blocked_count, 1);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        assert_eq!(LogAggregator::new("fw", 0).capacity(), 1);
    }
}
