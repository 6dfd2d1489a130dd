//! 성능 측정 소스 포트.
//!
//! vitals 콜백(`web-vitals` 라이브러리)과 Performance Observer 구독을 추상화.
//! 구현: `pagepulse-vitals::ScriptedPerformance`, `pagepulse-web::BrowserPerformance`

use std::sync::Arc;

use crate::error::CoreError;
use crate::models::metric::MetricKind;
use crate::models::performance::{EntryType, PerformanceEntry, VitalReport};

/// vitals 콜백
pub type VitalCallback = Arc<dyn Fn(VitalReport) + Send + Sync>;

/// Observer 엔트리 목록 콜백 (호출당 엔트리 목록 1개)
pub type EntryListCallback = Arc<dyn Fn(Vec<PerformanceEntry>) + Send + Sync>;

/// 성능 측정 소스
///
/// 각 구독은 독립적으로 실패할 수 있다. 미지원은 `CoreError::ObserverUnsupported`.
pub trait PerformanceSource: Send + Sync {
    /// 지표 콜백 구독
    fn on_vital(&self, kind: MetricKind, callback: VitalCallback) -> Result<(), CoreError>;

    /// Performance Observer 구독
    fn observe(&self, entry_type: EntryType, callback: EntryListCallback)
        -> Result<(), CoreError>;

    /// 모든 Observer 해제
    fn disconnect(&self) {}
}

/// 관찰된 엔트리를 분석 이벤트로 전달받는 쪽
///
/// 구현: `pagepulse-pipeline::EventTracker` (`long_task`, `largest_contentful_paint` 이벤트)
pub trait EntryListener: Send + Sync {
    /// 긴 작업 엔트리 1건
    fn long_task(&self, entry: &PerformanceEntry);

    /// 콜백 1회분 LCP 엔트리 중 마지막 것
    fn largest_contentful_paint(&self, entry: &PerformanceEntry);
}
