//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `gatewatch_`
//! - 모듈명: `collector_`, `aggregator_`, `broadcaster_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use gatewatch_core::metrics as m;
//! use metrics::counter;
//!
//! counter!(m::COLLECTOR_DATAGRAMS_RECEIVED_TOTAL, m::LABEL_FIREWALL => "fg60f-30th")
//!     .increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 어플라이언스 id 레이블 키
pub const LABEL_FIREWALL: &str = "firewall_id";

/// 옵저버 이름 레이블 키 (aggregator, broadcaster, ...)
pub const LABEL_OBSERVER: &str = "observer";

/// 카테고리 레이블 키 (traffic_forward, security_web, ...)
pub const LABEL_CATEGORY: &str = "category";

/// 판정 레이블 키 (blocked, allowed, other)
pub const LABEL_VERDICT: &str = "verdict";

/// 대시보드 이벤트 종류 레이블 키 (log, stats_update)
pub const LABEL_KIND: &str = "kind";

// ─── Collector 메트릭 ──────────────────────────────────────────────

/// Collector: 수신한 데이터그램 수 (counter)
pub const COLLECTOR_DATAGRAMS_RECEIVED_TOTAL: &str =
    "gatewatch_collector_datagrams_received_total";

/// Collector: 수신한 바이트 수 (counter)
pub const COLLECTOR_BYTES_RECEIVED_TOTAL: &str = "gatewatch_collector_bytes_received_total";

/// Collector: 옵저버 큐에 전달된 레코드 수 (counter, label: observer)
pub const COLLECTOR_RECORDS_DISPATCHED_TOTAL: &str =
    "gatewatch_collector_records_dispatched_total";

/// Collector: 큐가 가득 차 버려진 레코드 수 (counter, label: observer)
pub const COLLECTOR_DISPATCH_DROPPED_TOTAL: &str = "gatewatch_collector_dispatch_dropped_total";

/// Collector: 옵저버 에러/패닉 수 (counter, label: observer)
pub const COLLECTOR_OBSERVER_ERRORS_TOTAL: &str = "gatewatch_collector_observer_errors_total";

/// Collector: 소켓 수신 에러 수 (counter)
pub const COLLECTOR_RECV_ERRORS_TOTAL: &str = "gatewatch_collector_recv_errors_total";

/// Collector: 레코드 하나의 옵저버 처리 시간 (histogram, 초)
pub const COLLECTOR_OBSERVER_DURATION_SECONDS: &str =
    "gatewatch_collector_observer_duration_seconds";

// ─── Aggregator 메트릭 ─────────────────────────────────────────────

/// Aggregator: 집계된 레코드 수 (counter, labels: category, verdict)
pub const AGGREGATOR_RECORDS_TOTAL: &str = "gatewatch_aggregator_records_total";

/// Aggregator: 링 버퍼에 보관 중인 레코드 수 (gauge)
pub const AGGREGATOR_BUFFER_SIZE: &str = "gatewatch_aggregator_buffer_size";

/// Aggregator: 초기화 횟수 (counter)
pub const AGGREGATOR_RESETS_TOTAL: &str = "gatewatch_aggregator_resets_total";

// ─── Broadcaster 메트릭 ────────────────────────────────────────────

/// Broadcaster: 발행된 대시보드 이벤트 수 (counter, label: type)
pub const BROADCASTER_EVENTS_PUBLISHED_TOTAL: &str =
    "gatewatch_broadcaster_events_published_total";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "gatewatch_daemon_uptime_seconds";

/// Daemon: 실행 중인 어플라이언스 파이프라인 수 (gauge)
pub const DAEMON_APPLIANCES_RUNNING: &str = "gatewatch_daemon_appliances_running";

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "gatewatch_daemon_build_info";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 옵저버 처리 시간 히스토그램 버킷 (초)
///
/// 10us ~ 1s 범위, 로그 단위 분포
pub const OBSERVER_DURATION_BUCKETS: [f64; 9] = [
    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.1, 1.0,
];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 이 함수는 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `gatewatch-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // Collector
    describe_counter!(
        COLLECTOR_DATAGRAMS_RECEIVED_TOTAL,
        "Total number of UDP datagrams received from appliances"
    );
    describe_counter!(
        COLLECTOR_BYTES_RECEIVED_TOTAL,
        "Total number of payload bytes received from appliances"
    );
    describe_counter!(
        COLLECTOR_RECORDS_DISPATCHED_TOTAL,
        "Total number of parsed records queued for observers"
    );
    describe_counter!(
        COLLECTOR_DISPATCH_DROPPED_TOTAL,
        "Total number of records dropped because an observer queue was full"
    );
    describe_counter!(
        COLLECTOR_OBSERVER_ERRORS_TOTAL,
        "Total number of observer failures (errors and panics)"
    );
    describe_counter!(
        COLLECTOR_RECV_ERRORS_TOTAL,
        "Total number of socket receive errors"
    );
    describe_histogram!(
        COLLECTOR_OBSERVER_DURATION_SECONDS,
        "Time an observer spent handling a single record in seconds"
    );

    // Aggregator
    describe_counter!(
        AGGREGATOR_RECORDS_TOTAL,
        "Total number of records aggregated, by category and verdict"
    );
    describe_gauge!(
        AGGREGATOR_BUFFER_SIZE,
        "Current number of records held in the recent-log ring buffer"
    );
    describe_counter!(
        AGGREGATOR_RESETS_TOTAL,
        "Total number of aggregator resets"
    );

    // Broadcaster
    describe_counter!(
        BROADCASTER_EVENTS_PUBLISHED_TOTAL,
        "Total number of dashboard events published"
    );

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "gatewatch daemon uptime in seconds");
    describe_gauge!(
        DAEMON_APPLIANCES_RUNNING,
        "Number of appliance pipelines currently running"
    );
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}
