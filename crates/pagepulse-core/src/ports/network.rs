//! 네트워크 상태 포트.
//!
//! 구현: `pagepulse-web` (`navigator.onLine`), 테스트용 토글

use std::sync::atomic::{AtomicBool, Ordering};

/// 브라우저가 보고하는 온라인 여부
pub trait NetworkStatus: Send + Sync {
    fn is_online(&self) -> bool;
}

/// 수동으로 전환하는 네트워크 상태 (헤드리스 호스트/테스트용)
#[derive(Debug)]
pub struct ManualNetworkStatus {
    online: AtomicBool,
}

impl ManualNetworkStatus {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    /// 온라인 여부 변경
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Relaxed);
    }
}

impl NetworkStatus for ManualNetworkStatus {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }
}
