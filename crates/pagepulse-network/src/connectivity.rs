//! 연결 상태 관리.
//!
//! 브라우저가 보고하는 온라인 여부(`NetworkStatus`)와 전송 결과를 함께 본다.
//! 연속 실패가 임계값에 도달하면 즉시 전송을 멈추고 큐잉으로 전환한다.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use pagepulse_core::ports::clock::Clock;
use pagepulse_core::ports::network::NetworkStatus;
use serde::Serialize;
use tracing::{debug, info, warn};

/// 연결 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// 연결됨
    Connected,
    /// 연결 끊김 (임계값 도달 또는 브라우저 오프라인)
    Disconnected,
    /// 실패가 있었지만 임계값 미만
    Reconnecting,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Connected => write!(f, "Connected"),
            ConnectionStatus::Disconnected => write!(f, "Disconnected"),
            ConnectionStatus::Reconnecting => write!(f, "Reconnecting"),
        }
    }
}

/// 연결 상태 관리자
pub struct ConnectivityManager {
    network: Arc<dyn NetworkStatus>,
    clock: Arc<dyn Clock>,
    /// 전송 실패 임계값 미도달 여부
    reachable: AtomicBool,
    /// 마지막 전송 성공 시각 (epoch ms, 0이면 없음)
    last_success: AtomicI64,
    /// 연속 실패 횟수
    failure_count: AtomicU64,
    status: Mutex<ConnectionStatus>,
    /// 오프라인 전환 임계값 (연속 실패 횟수)
    offline_threshold: u64,
    /// 강제 오프라인 모드
    force_offline: AtomicBool,
}

impl ConnectivityManager {
    /// `offline_threshold`: 이 횟수만큼 연속 실패하면 오프라인 전환
    pub fn new(
        network: Arc<dyn NetworkStatus>,
        clock: Arc<dyn Clock>,
        offline_threshold: u64,
    ) -> Self {
        Self {
            network,
            clock,
            reachable: AtomicBool::new(true),
            last_success: AtomicI64::new(0),
            failure_count: AtomicU64::new(0),
            status: Mutex::new(ConnectionStatus::Connected),
            offline_threshold: offline_threshold.max(1),
            force_offline: AtomicBool::new(false),
        }
    }

    /// 강제 오프라인 모드 설정
    pub fn set_force_offline(&self, force: bool) {
        self.force_offline.store(force, Ordering::Relaxed);
        if force {
            *self.status.lock() = ConnectionStatus::Disconnected;
            info!("강제 오프라인 모드 활성화");
        }
    }

    pub fn is_force_offline(&self) -> bool {
        self.force_offline.load(Ordering::Relaxed)
    }

    /// 브라우저가 온라인이라고 보고하는지 (강제 오프라인 반영)
    pub fn browser_online(&self) -> bool {
        !self.is_force_offline() && self.network.is_online()
    }

    /// 즉시 전송 가능 여부
    pub fn is_online(&self) -> bool {
        self.browser_online() && self.reachable.load(Ordering::Relaxed)
    }

    /// 현재 연결 상태
    pub fn status(&self) -> ConnectionStatus {
        if !self.browser_online() {
            return ConnectionStatus::Disconnected;
        }
        *self.status.lock()
    }

    /// 전송 성공 기록: 온라인 복귀 + 실패 카운터 리셋
    pub fn record_success(&self) {
        if self.is_force_offline() {
            return;
        }

        let was_unreachable = !self.reachable.swap(true, Ordering::Relaxed);
        self.failure_count.store(0, Ordering::Relaxed);
        self.last_success
            .store(self.clock.now_millis(), Ordering::Relaxed);
        *self.status.lock() = ConnectionStatus::Connected;

        if was_unreachable {
            info!("수집 서버 연결 복구 - 즉시 전송 재개");
        }
    }

    /// 전송 실패 기록: 임계값 도달 시 오프라인 전환
    pub fn record_failure(&self) {
        if self.is_force_offline() {
            return;
        }

        let count = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("전송 실패 기록 (연속 {}회)", count);

        if count >= self.offline_threshold {
            let was_reachable = self.reachable.swap(false, Ordering::Relaxed);
            *self.status.lock() = ConnectionStatus::Disconnected;
            if was_reachable {
                warn!("연속 {}회 실패 - 오프라인 모드 전환 (이벤트 큐잉)", count);
            }
        } else {
            *self.status.lock() = ConnectionStatus::Reconnecting;
        }
    }

    /// 브라우저 `online` 이벤트: 다음 전송을 다시 시도할 수 있게 한다
    pub fn handle_online(&self) {
        self.reachable.store(true, Ordering::Relaxed);
        self.failure_count.store(0, Ordering::Relaxed);
        *self.status.lock() = ConnectionStatus::Connected;
        info!("브라우저 온라인 전환");
    }

    /// 연속 실패 횟수
    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    /// 마지막 전송 성공 이후 경과 시간 (ms, 성공 기록 없으면 0)
    pub fn millis_since_last_success(&self) -> i64 {
        let last = self.last_success.load(Ordering::Relaxed);
        if last == 0 {
            return 0;
        }
        (self.clock.now_millis() - last).max(0)
    }

    /// 연결 상태 통계
    pub fn stats(&self) -> ConnectivityStats {
        ConnectivityStats {
            is_online: self.is_online(),
            browser_online: self.browser_online(),
            status: self.status(),
            failure_count: self.failure_count(),
            millis_since_last_success: self.millis_since_last_success(),
            force_offline: self.is_force_offline(),
        }
    }
}

/// 연결 상태 통계
#[derive(Debug, Clone, Serialize)]
pub struct ConnectivityStats {
    /// 즉시 전송 가능 여부
    pub is_online: bool,
    /// 브라우저 온라인 여부
    pub browser_online: bool,
    pub status: ConnectionStatus,
    /// 연속 실패 횟수
    pub failure_count: u64,
    /// 마지막 성공 이후 경과 시간 (ms)
    pub millis_since_last_success: i64,
    pub force_offline: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagepulse_core::ports::network::ManualNetworkStatus;

    struct FixedClock(AtomicI64);

    impl Clock for FixedClock {
        fn now_millis(&self) -> i64 {
            self.0.load(Ordering::Relaxed)
        }
    }

    fn manager(threshold: u64) -> (ConnectivityManager, Arc<ManualNetworkStatus>) {
        let network = Arc::new(ManualNetworkStatus::new(true));
        let mgr = ConnectivityManager::new(
            network.clone(),
            Arc::new(FixedClock(AtomicI64::new(10_000))),
            threshold,
        );
        (mgr, network)
    }

    #[test]
    fn initial_state_is_online() {
        let (mgr, _) = manager(3);
        assert!(mgr.is_online());
        assert_eq!(mgr.status(), ConnectionStatus::Connected);
        assert_eq!(mgr.failure_count(), 0);
        assert_eq!(mgr.millis_since_last_success(), 0);
    }

    #[test]
    fn threshold_triggers_offline() {
        let (mgr, _) = manager(3);

        mgr.record_failure();
        assert!(mgr.is_online());
        assert_eq!(mgr.status(), ConnectionStatus::Reconnecting);

        mgr.record_failure();
        assert!(mgr.is_online());

        mgr.record_failure();
        assert!(!mgr.is_online());
        assert!(mgr.browser_online());
        assert_eq!(mgr.status(), ConnectionStatus::Disconnected);

        mgr.record_success();
        assert!(mgr.is_online());
        assert_eq!(mgr.failure_count(), 0);
    }

    #[test]
    fn browser_offline_wins() {
        let (mgr, network) = manager(3);
        network.set_online(false);
        assert!(!mgr.is_online());
        assert_eq!(mgr.status(), ConnectionStatus::Disconnected);

        network.set_online(true);
        assert!(mgr.is_online());
    }

    #[test]
    fn online_event_resets_failures() {
        let (mgr, _) = manager(1);
        mgr.record_failure();
        assert!(!mgr.is_online());

        mgr.handle_online();
        assert!(mgr.is_online());
        assert_eq!(mgr.failure_count(), 0);
    }

    #[test]
    fn force_offline_overrides() {
        let (mgr, _) = manager(3);

        mgr.set_force_offline(true);
        assert!(!mgr.is_online());
        mgr.record_success();
        assert!(!mgr.is_online());

        mgr.set_force_offline(false);
        mgr.record_success();
        assert!(mgr.is_online());
        assert!(mgr.stats().is_online);
    }
}
