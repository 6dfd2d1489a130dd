//! 시계 포트.

/// 현재 시각 제공자
pub trait Clock: Send + Sync {
    /// 현재 시각 (epoch ms)
    fn now_millis(&self) -> i64;
}

/// 시스템 시계 (chrono)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}
