//! Vitals 수집기.
//!
//! 5개 vitals 콜백과 4개 Performance Observer를 각각 독립적으로 구독한다.
//! 한 구독의 실패는 다른 구독에 영향을 주지 않으며 결과는 `CapabilitySet`으로 보고한다.
//!
//! vitals 값은 페이지뷰 스냅샷에 기록(last-write-wins)되고 분류된다.
//! LCP/FID/CLS가 poor로 분류되면 `MitigationSink`로 완화를 요청한다.
//! 긴 작업과 LCP 엔트리는 등록된 [`EntryListener`]로도 전달된다.
//!
//! `stop` 후 `start`하면 다시 구독한다 (bfcache 복원). 이전 구독의 콜백은
//! 세대 번호가 달라 무시된다.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use pagepulse_core::config::VitalsConfig;
use pagepulse_core::models::metric::{Level, MetricKind, MetricSample, MetricsSnapshot};
use pagepulse_core::models::mitigation::MitigationRequest;
use pagepulse_core::models::performance::{EntryType, PerformanceEntry, VitalReport};
use pagepulse_core::ports::clock::Clock;
use pagepulse_core::ports::mitigation::MitigationSink;
use pagepulse_core::ports::page::PageContext;
use pagepulse_core::ports::performance::{EntryListener, PerformanceSource};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::capability::{Capability, CapabilitySet, SubscriptionStatus};
use crate::classifier::classify;

/// Observer 누적 통계
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObserverStats {
    /// 수신한 vitals 값 수
    pub vital_readings: u64,
    /// 감지된 긴 작업 수
    pub long_tasks: u64,
    /// 사용자 입력 제외 layout shift 누적 점수
    pub layout_shift_score: f64,
    /// 느린 리소스 수
    pub slow_resources: u64,
    /// 수신한 LCP 엔트리 수
    pub lcp_entries: u64,
    /// 요청한 완화 수
    pub mitigations_requested: u64,
}

struct CollectorState {
    snapshot: MetricsSnapshot,
    capabilities: Option<CapabilitySet>,
    stats: ObserverStats,
}

/// Vitals 수집기
pub struct VitalsCollector {
    config: VitalsConfig,
    source: Arc<dyn PerformanceSource>,
    mitigation: Arc<dyn MitigationSink>,
    clock: Arc<dyn Clock>,
    page: Arc<dyn PageContext>,
    state: Mutex<CollectorState>,
    listener: RwLock<Option<Arc<dyn EntryListener>>>,
    /// start/stop 직렬화
    lifecycle: Mutex<()>,
    running: AtomicBool,
    /// 현재 구독 세대 (start마다 증가)
    generation: AtomicU64,
}

impl VitalsCollector {
    /// 새 수집기 생성 (구독은 `start`에서)
    pub fn new(
        config: VitalsConfig,
        source: Arc<dyn PerformanceSource>,
        mitigation: Arc<dyn MitigationSink>,
        clock: Arc<dyn Clock>,
        page: Arc<dyn PageContext>,
    ) -> Arc<Self> {
        let snapshot = MetricsSnapshot::new(clock.now_millis(), page.url());
        Arc::new(Self {
            config,
            source,
            mitigation,
            clock,
            page,
            state: Mutex::new(CollectorState {
                snapshot,
                capabilities: None,
                stats: ObserverStats::default(),
            }),
            listener: RwLock::new(None),
            lifecycle: Mutex::new(()),
            running: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        })
    }

    /// 긴 작업/LCP 엔트리 수신자 등록
    pub fn set_entry_listener(&self, listener: Arc<dyn EntryListener>) {
        *self.listener.write() = Some(listener);
    }

    /// 구독 시작. 실행 중이면 기존 구독 결과를 그대로 반환한다.
    ///
    /// `stop` 이후 호출은 같은 스냅샷을 유지한 채 다시 구독한다.
    pub fn start(self: &Arc<Self>) -> CapabilitySet {
        let _lifecycle = self.lifecycle.lock();
        let previous = self.state.lock().capabilities.clone();
        if let (true, Some(existing)) = (self.is_running(), previous.as_ref()) {
            debug!("vitals 수집기 이미 시작됨");
            return existing.clone();
        }

        let restarting = previous.is_some();
        if !restarting {
            let mut state = self.state.lock();
            state.snapshot = MetricsSnapshot::new(self.clock.now_millis(), self.page.url());
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.running.store(true, Ordering::SeqCst);

        let mut capabilities = CapabilitySet::new();

        for kind in MetricKind::ALL {
            let weak = Arc::downgrade(self);
            let result = self.source.on_vital(
                kind,
                Arc::new(move |report: VitalReport| {
                    if let Some(collector) = weak.upgrade().filter(|c| c.is_current(generation)) {
                        collector.handle_vital(kind, report);
                    }
                }),
            );
            capabilities.insert(Capability::Vital(kind), SubscriptionStatus::from_result(result));
        }

        for entry_type in EntryType::ALL {
            let weak: Weak<Self> = Arc::downgrade(self);
            let result = self.source.observe(
                entry_type,
                Arc::new(move |entries: Vec<PerformanceEntry>| {
                    if let Some(collector) = weak.upgrade().filter(|c| c.is_current(generation)) {
                        collector.handle_entries(entry_type, &entries);
                    }
                }),
            );
            capabilities.insert(
                Capability::Observer(entry_type),
                SubscriptionStatus::from_result(result),
            );
        }

        for (capability, status) in capabilities.iter() {
            match status {
                SubscriptionStatus::Active => {}
                SubscriptionStatus::Unsupported => {
                    info!(%capability, "구독 미지원, 건너뜀");
                }
                SubscriptionStatus::Failed(reason) => {
                    warn!(%capability, %reason, "구독 실패");
                }
            }
        }
        info!(
            active = capabilities.active_count(),
            total = capabilities.len(),
            restarting,
            "vitals 수집 시작"
        );

        self.state.lock().capabilities = Some(capabilities.clone());
        capabilities
    }

    /// 수집 중지. 이후 도착한 콜백은 무시한다.
    pub fn stop(&self) {
        let _lifecycle = self.lifecycle.lock();
        if self.running.swap(false, Ordering::SeqCst) {
            self.source.disconnect();
            info!("vitals 수집 중지");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// 현재 스냅샷 복사본
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.state.lock().snapshot.clone()
    }

    /// 시작 시 구독 결과 (시작 전이면 None)
    pub fn capabilities(&self) -> Option<CapabilitySet> {
        self.state.lock().capabilities.clone()
    }

    pub fn stats(&self) -> ObserverStats {
        self.state.lock().stats.clone()
    }

    fn handle_vital(&self, kind: MetricKind, report: VitalReport) {
        if !self.is_running() {
            return;
        }
        if !report.value.is_finite() {
            warn!(metric = %kind, value = report.value, "유효하지 않은 vitals 값 무시");
            return;
        }

        let Some(classification) = classify(kind, report.value) else {
            return;
        };

        {
            let mut state = self.state.lock();
            state.snapshot.record(MetricSample {
                kind,
                value: report.value,
                captured_at: self.clock.now_millis(),
            });
            state.stats.vital_readings += 1;
        }

        if classification.level != Level::Poor {
            info!(
                metric = %kind,
                value = %format_args!("{:.2}", report.value),
                level = %classification.level,
                score = classification.score,
                "vitals 측정"
            );
            return;
        }

        warn!(
            metric = %kind,
            value = %format_args!("{:.2}", report.value),
            level = %classification.level,
            score = classification.score,
            "vitals 불량"
        );

        if kind.is_mitigable() {
            self.state.lock().stats.mitigations_requested += 1;
            warn!(metric = %kind, "완화 요청");
            self.mitigation.request(MitigationRequest {
                kind,
                value: report.value,
            });
        }
    }

    fn handle_entries(&self, entry_type: EntryType, entries: &[PerformanceEntry]) {
        if !self.is_running() {
            return;
        }
        match entry_type {
            EntryType::Longtask => self.handle_long_tasks(entries),
            EntryType::LayoutShift => self.handle_layout_shifts(entries),
            EntryType::Resource => self.handle_resources(entries),
            EntryType::LargestContentfulPaint => self.handle_lcp_entries(entries),
        }
    }

    fn entry_listener(&self) -> Option<Arc<dyn EntryListener>> {
        self.listener.read().clone()
    }

    fn handle_long_tasks(&self, entries: &[PerformanceEntry]) {
        for entry in entries {
            warn!(
                duration = entry.duration,
                start_time = entry.start_time,
                name = %entry.name,
                "긴 작업 감지"
            );
        }
        self.state.lock().stats.long_tasks += entries.len() as u64;
        if let Some(listener) = self.entry_listener() {
            for entry in entries {
                listener.long_task(entry);
            }
        }
    }

    fn handle_lcp_entries(&self, entries: &[PerformanceEntry]) {
        let Some(last) = entries.last() else {
            return;
        };
        debug!(
            start_time = last.start_time,
            element = last.element.as_deref().unwrap_or("unknown"),
            "LCP 후보 갱신"
        );
        self.state.lock().stats.lcp_entries += entries.len() as u64;
        if let Some(listener) = self.entry_listener() {
            listener.largest_contentful_paint(last);
        }
    }

    fn handle_layout_shifts(&self, entries: &[PerformanceEntry]) {
        let score: f64 = entries
            .iter()
            .filter(|e| !e.had_recent_input)
            .filter_map(|e| e.value)
            .filter(|v| v.is_finite())
            .sum();

        if score > 0.0 {
            warn!(score, "레이아웃 이동 감지");
            self.state.lock().stats.layout_shift_score += score;
        }
    }

    fn handle_resources(&self, entries: &[PerformanceEntry]) {
        let mut slow = 0u64;
        for entry in entries.iter().filter(|e| e.duration > self.config.slow_resource_ms) {
            warn!(
                name = %entry.name,
                duration = entry.duration,
                size = entry.transfer_size,
                "느린 리소스"
            );
            slow += 1;
        }
        if slow > 0 {
            self.state.lock().stats.slow_resources += slow;
        }
    }
}
