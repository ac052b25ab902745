//! 로그 수집 모듈 -- 방화벽 어플라이언스의 UDP 로그를 수신합니다.
//!
//! - [`adapter`]: 데이터그램 바이트를 파서 입력 텍스트로 변환
//! - [`FirewallCollector`]: 어플라이언스 하나의 UDP 수신 루프
//! - [`Dispatcher`]: 파싱된 레코드를 옵저버별 큐로 전달
//!
//! # 아키텍처
//! ```text
//! UdpSocket -> recv loop -> adapter -> parser -> Dispatcher --try_send--> [queue] -> worker -> observer.handle
//!                                                           \--try_send--> [queue] -> worker -> observer.handle
//! ```
//! 수신 루프는 옵저버를 기다리지 않습니다. 옵저버마다 전용 큐와 워커 태스크가 있어
//! 느린 옵저버는 자기 큐에서만 레코드를 잃습니다.

pub mod adapter;
pub mod dispatch;
pub mod firewall_udp;

pub use adapter::decode_datagram;
pub use dispatch::Dispatcher;
pub use firewall_udp::{CollectorConfig, FirewallCollector};

use std::net::SocketAddr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// 수신한 UDP 데이터그램
#[derive(Debug, Clone)]
pub struct Datagram {
    /// 페이로드 바이트
    pub data: Bytes,
    /// 송신자 주소
    pub peer: SocketAddr,
    /// 수신 시각
    pub received_at: DateTime<Utc>,
}

impl Datagram {
    /// 현재 시각으로 새 데이터그램을 생성합니다.
    pub fn new(data: impl Into<Bytes>, peer: SocketAddr) -> Self {
        Self {
            data: data.into(),
            peer,
            received_at: Utc::now(),
        }
    }
}

/// 수집기 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectorStatus {
    /// 실행 대기 중
    Idle,
    /// 실행 중
    Running,
    /// 에러로 중단됨
    Error(String),
    /// 정상 종료됨
    Stopped,
}

/// 수집기 누적 카운터
///
/// 수신 루프와 디스패치 워커가 공유합니다.
#[derive(Debug, Default)]
pub struct CollectorCounters {
    datagrams: AtomicU64,
    bytes: AtomicU64,
    dispatched: AtomicU64,
    dropped: AtomicU64,
    observer_errors: AtomicU64,
    recv_errors: AtomicU64,
    /// 마지막 정상 수신 이후 연속된 수신 에러 수
    consecutive_recv_errors: AtomicU64,
    last_recv_error: Mutex<Option<String>>,
}

impl CollectorCounters {
    pub(crate) fn record_datagram(&self, len: usize) {
        self.datagrams.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(len as u64, Ordering::Relaxed);
        self.consecutive_recv_errors.store(0, Ordering::Relaxed);
    }

    pub(crate) fn record_recv_error(&self, error: &std::io::Error) {
        self.recv_errors.fetch_add(1, Ordering::Relaxed);
        self.consecutive_recv_errors.fetch_add(1, Ordering::Relaxed);
        let mut last = self
            .last_recv_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *last = Some(error.to_string());
    }

    /// 마지막 수신 이후 수신 에러가 이어지고 있으면 그 에러 메시지를 반환합니다.
    ///
    /// 데이터그램을 하나라도 정상 수신하면 `None`으로 돌아갑니다.
    pub fn unresolved_recv_error(&self) -> Option<String> {
        if self.consecutive_recv_errors.load(Ordering::Relaxed) == 0 {
            return None;
        }
        self.last_recv_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub(crate) fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_observer_error(&self) {
        self.observer_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// 현재 값의 스냅샷을 반환합니다.
    pub fn snapshot(&self) -> CollectorStats {
        CollectorStats {
            datagrams_received: self.datagrams.load(Ordering::Relaxed),
            bytes_received: self.bytes.load(Ordering::Relaxed),
            records_dispatched: self.dispatched.load(Ordering::Relaxed),
            dispatch_dropped: self.dropped.load(Ordering::Relaxed),
            observer_errors: self.observer_errors.load(Ordering::Relaxed),
            recv_errors: self.recv_errors.load(Ordering::Relaxed),
        }
    }
}

/// 수집기 통계 스냅샷
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectorStats {
    /// 수신한 데이터그램 수
    pub datagrams_received: u64,
    /// 수신한 바이트 수
    pub bytes_received: u64,
    /// 옵저버 큐에 들어간 레코드 수 (옵저버마다 1씩)
    pub records_dispatched: u64,
    /// 큐가 가득 차 버려진 레코드 수
    pub dispatch_dropped: u64,
    /// 옵저버 에러/패닉 수
    pub observer_errors: u64,
    /// 소켓 수신 에러 수
    pub recv_errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_snapshot_reflects_updates() {
        let counters = CollectorCounters::default();
        counters.record_datagram(100);
        counters.record_datagram(20);
        counters.record_dispatched();
        counters.record_dropped();
        counters.record_observer_error();

        let stats = counters.snapshot();
        assert_eq!(stats.datagrams_received, 2);
        assert_eq!(stats.bytes_received, 120);
        assert_eq!(stats.records_dispatched, 1);
        assert_eq!(stats.dispatch_dropped, 1);
        assert_eq!(stats.observer_errors, 1);
        assert_eq!(stats.recv_errors, 0);
    }

    #[test]
    fn recv_error_stays_unresolved_until_next_datagram() {
        let counters = CollectorCounters::default();
        assert!(counters.unresolved_recv_error().is_none());

        let err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset");
        counters.record_recv_error(&err);
        counters.record_recv_error(&err);
        assert_eq!(counters.snapshot().recv_errors, 2);
        assert!(
            counters
                .unresolved_recv_error()
                .is_some_and(|reason| reason.contains("connection reset"))
        );

        counters.record_datagram(10);
        assert!(counters.unresolved_recv_error().is_none());
        assert_eq!(counters.snapshot().recv_errors, 2);
    }

    #[test]
    fn datagram_new_sets_received_at() {
        let before = Utc::now();
        let dg = Datagram::new(&b"type=event"[..], "127.0.0.1:9999".parse().unwrap());
        assert!(dg.received_at >= before);
        assert_eq!(&dg.data[..], b"type=event");
    }
}
