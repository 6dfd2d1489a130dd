//! 텔레메트리 엔진.
//!
//! 설정과 [`Platform`]을 받아 모든 컴포넌트를 명시적으로 연결한다.
//! 전역 인스턴스는 없으며 엔진마다 상태가 완전히 분리된다.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use pagepulse_core::config::AppConfig;
use pagepulse_core::error::CoreError;
use pagepulse_core::models::event::{
    Conversion, EngagementKind, LeadType, Params, ProductAction, ProductDetails,
};
use pagepulse_core::models::metric::{MetricKind, PerformanceRating};
use pagepulse_core::ports::clock::Clock;
use pagepulse_core::ports::mitigation::MitigationSink;
use pagepulse_core::ports::performance::EntryListener;
use pagepulse_mitigation::executor::{MitigationExecutor, MitigationStats};
use pagepulse_network::connectivity::ConnectivityManager;
use pagepulse_network::queue::{DeliveryQueue, FlushReport, QueueStats, RetryPolicy};
use pagepulse_pipeline::listeners::PassiveListeners;
use pagepulse_pipeline::marks::PerformanceMarks;
use pagepulse_pipeline::spawn::spawn_flush;
use pagepulse_pipeline::tracker::{EventTracker, PipelineStats};
use pagepulse_storage::identity::IdentityStore;
use pagepulse_vitals::capability::CapabilitySet;
use pagepulse_vitals::collector::{ObserverStats, VitalsCollector};
use pagepulse_vitals::score::ScoreAggregator;
use serde::Serialize;
use tracing::{debug, info};

use crate::platform::Platform;

/// 엔진 전체 통계
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub pipeline: PipelineStats,
    pub observers: ObserverStats,
    pub capabilities: Option<CapabilitySet>,
    pub ratings_computed: usize,
}

/// 텔레메트리 엔진
pub struct TelemetryEngine {
    config: AppConfig,
    clock: Arc<dyn Clock>,
    identity: Arc<IdentityStore>,
    collector: Arc<VitalsCollector>,
    mitigation: Arc<MitigationExecutor>,
    aggregator: ScoreAggregator,
    tracker: Arc<EventTracker>,
    listeners: Arc<PassiveListeners>,
    marks: PerformanceMarks,
    /// 시작 시각 (0이면 미시작)
    started_at: AtomicI64,
    vitals_reported: AtomicBool,
}

impl TelemetryEngine {
    /// 설정 검증 후 컴포넌트 연결. 구독/전송은 `start`에서 시작한다.
    pub fn new(config: AppConfig, platform: Platform) -> Result<Self, CoreError> {
        config.validate()?;

        let identity = Arc::new(IdentityStore::new(
            platform.durable,
            platform.ephemeral,
            platform.page.clone(),
            platform.clock.clone(),
        ));

        let mitigation = Arc::new(MitigationExecutor::new(
            config.mitigation.clone(),
            platform.dom,
        ));
        let mitigation_sink: Arc<dyn MitigationSink> = mitigation.clone();
        let collector = VitalsCollector::new(
            config.vitals.clone(),
            platform.performance,
            mitigation_sink,
            platform.clock.clone(),
            platform.page.clone(),
        );

        let connectivity = Arc::new(ConnectivityManager::new(
            platform.network,
            platform.clock.clone(),
            config.connectivity.offline_threshold,
        ));
        let queue = Arc::new(DeliveryQueue::new(
            platform.sink,
            connectivity,
            platform.clock.clone(),
            RetryPolicy::from(&config.queue),
        ));

        let tracker = Arc::new(EventTracker::new(
            config.tracking.clone(),
            identity.clone(),
            platform.page.clone(),
            platform.clock.clone(),
            queue,
            platform.third_party,
        ));
        let entry_listener: Arc<dyn EntryListener> = tracker.clone();
        collector.set_entry_listener(entry_listener);
        let listeners = Arc::new(PassiveListeners::new(
            tracker.clone(),
            platform.page,
            platform.clock.clone(),
        ));

        Ok(Self {
            aggregator: ScoreAggregator::new(config.vitals.rating_history_limit),
            config,
            clock: platform.clock.clone(),
            identity,
            collector,
            mitigation,
            tracker,
            listeners,
            marks: PerformanceMarks::new(platform.clock.clone()),
            started_at: AtomicI64::new(0),
            vitals_reported: AtomicBool::new(false),
        })
    }

    /// 엔진 시작
    ///
    /// 식별 정보 준비 → vitals 구독 → (설정 시) 페이지뷰 → 대기 큐 flush.
    /// 두 번째 호출부터는 수집기만 다시 시작하고 (중지돼 있었다면) 구독 결과를 반환한다.
    pub fn start(&self) -> CapabilitySet {
        let now = self.clock.now_millis().max(1);
        if self
            .started_at
            .compare_exchange(0, now, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("엔진 이미 시작됨");
            return self.collector.start();
        }

        let identity = self.identity.identity();
        info!(
            session_id = %identity.session_id,
            segment = %identity.user_segment,
            "PAGEPULSE 시작"
        );

        let capabilities = self.collector.start();

        if self.config.tracking.auto_page_view {
            self.tracker.track_page_view(None, None);
        }

        let queue = self.tracker.queue();
        if !queue.is_empty() {
            spawn_flush(queue.clone(), false);
        }
        capabilities
    }

    pub fn is_started(&self) -> bool {
        self.started_at.load(Ordering::Acquire) != 0
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    // ============================================================
    // 추적 API
    // ============================================================

    pub fn track_event(&self, name: &str, params: Params) {
        self.tracker.track_event(name, params);
    }

    pub fn track_page_view(&self, url: Option<&str>, title: Option<&str>) {
        self.tracker.track_page_view(url, title);
    }

    pub fn track_conversion(&self, conversion: Conversion) {
        self.tracker.track_conversion(conversion);
    }

    pub fn track_lead(&self, source: &str, lead_type: LeadType, value: Option<f64>) {
        self.tracker.track_lead(source, lead_type, value);
    }

    pub fn track_phone_call(&self, phone_number: &str, source: &str) {
        self.tracker.track_phone_call(phone_number, source);
    }

    pub fn track_search(&self, query: &str, results_count: usize, filters: Option<serde_json::Value>) {
        self.tracker.track_search(query, results_count, filters);
    }

    pub fn track_form_submission(&self, form_name: &str, form_data: Option<&Params>) {
        self.tracker.track_form_submission(form_name, form_data);
    }

    pub fn track_product_interaction(
        &self,
        product_id: &str,
        action: ProductAction,
        details: ProductDetails,
    ) {
        self.tracker
            .track_product_interaction(product_id, action, details);
    }

    pub fn track_engagement(&self, kind: EngagementKind, data: Params) {
        self.tracker.track_engagement(kind, data);
    }

    pub fn set_user_id(&self, user_id: Option<&str>) {
        self.tracker.set_user_id(user_id);
    }

    // ============================================================
    // 사용자 타이밍
    // ============================================================

    pub fn mark(&self, name: &str) {
        self.marks.mark(name);
    }

    /// mark 간 경과 ms. 없는 mark면 0
    pub fn measure(&self, name: &str, start: &str, end: Option<&str>) -> f64 {
        self.marks.measure(name, start, end)
    }

    /// `performance_metric` 이벤트 (단위 생략 시 ms)
    pub fn report_metric(&self, name: &str, value: f64, unit: Option<&str>) {
        self.tracker.report_metric(name, value, unit);
    }

    // ============================================================
    // 성능 등급
    // ============================================================

    /// 현재 스냅샷으로 종합 등급 계산 (이력에 추가)
    pub fn performance_rating(&self) -> PerformanceRating {
        self.aggregator.rate(&self.collector.snapshot())
    }

    /// 종합 등급을 계산해 `web_vitals` 이벤트로 보고
    pub fn report_vitals(&self) -> PerformanceRating {
        let rating = self.performance_rating();
        self.tracker.report_vitals(&rating);
        self.vitals_reported.store(true, Ordering::Release);
        info!(
            score = %format_args!("{:.1}", rating.score),
            level = %rating.level,
            "성능 등급 보고"
        );
        rating
    }

    pub fn rating_history(&self) -> Vec<PerformanceRating> {
        self.aggregator.history()
    }

    // ============================================================
    // 전송 / 라이프사이클
    // ============================================================

    /// 큐 즉시 flush (backoff 무시)
    pub async fn flush(&self) -> FlushReport {
        self.tracker.queue().flush().await
    }

    /// 주기 호출용. backoff를 지키는 flush + 지연 vitals 보고
    pub async fn tick(&self) -> Option<FlushReport> {
        self.maybe_report_vitals();
        self.tracker.queue().maybe_flush().await
    }

    fn maybe_report_vitals(&self) {
        let started_at = self.started_at.load(Ordering::Acquire);
        if started_at == 0 || self.vitals_reported.load(Ordering::Acquire) {
            return;
        }
        let elapsed = self.clock.now_millis() - started_at;
        if elapsed >= self.config.vitals.report_delay_ms as i64
            && self.collector.snapshot().sample_count() > 0
        {
            self.report_vitals();
        }
    }

    /// 브라우저 `online` 이벤트
    pub fn handle_online(&self) -> bool {
        self.listeners.on_online()
    }

    /// `pagehide`: beacon flush. beacon으로 수락된 이벤트 수 반환
    ///
    /// bfcache에 들어가는 경우(`persisted`)에는 복원될 수 있으므로 수집을 유지한다.
    pub fn handle_page_hide(&self, persisted: bool) -> usize {
        let sent = self.listeners.on_page_hide();
        if !persisted {
            self.collector.stop();
        }
        sent
    }

    /// `pageshow`: bfcache 복원이면 수집 재개. 재구독 결과 반환
    pub fn handle_page_show(&self, persisted: bool) -> Option<CapabilitySet> {
        if !persisted || !self.is_started() {
            return None;
        }
        info!("bfcache 복원 - vitals 수집 재개");
        Some(self.collector.start())
    }

    pub fn listeners(&self) -> &Arc<PassiveListeners> {
        &self.listeners
    }

    pub fn capabilities(&self) -> Option<CapabilitySet> {
        self.collector.capabilities()
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.tracker.queue().stats()
    }

    /// 대기 중인 이벤트 이름 (큐 순서)
    pub fn pending_event_names(&self) -> Vec<String> {
        self.tracker
            .queue()
            .pending()
            .into_iter()
            .map(|queued| queued.event.name)
            .collect()
    }

    pub fn set_mitigation_enabled(&self, enabled: bool) {
        self.mitigation.set_enabled(enabled);
    }

    pub fn mitigation_stats(&self, kind: MetricKind) -> MitigationStats {
        self.mitigation.stats(kind)
    }

    pub fn session_id(&self) -> String {
        self.identity.get_or_create_session_id()
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            pipeline: self.tracker.stats(),
            observers: self.collector.stats(),
            capabilities: self.collector.capabilities(),
            ratings_computed: self.aggregator.history_len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::RecordingEventSink;
    use pagepulse_core::models::performance::{EntryType, PerformanceEntry};
    use pagepulse_core::ports::page::StaticPage;

    fn page() -> StaticPage {
        StaticPage {
            url: "https://shop.example.com/".into(),
            hostname: "shop.example.com".into(),
            user_agent: "Mozilla/5.0".into(),
            title: "Home".into(),
            ..StaticPage::default()
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = AppConfig::default_config();
        config.queue.max_attempts = 1;
        let (platform, _) = Platform::headless(page(), Arc::new(RecordingEventSink::new()), 1);

        assert!(matches!(
            TelemetryEngine::new(config, platform),
            Err(CoreError::Validation { .. })
        ));
    }

    #[test]
    fn start_is_idempotent() {
        let (platform, handles) =
            Platform::headless(page(), Arc::new(RecordingEventSink::new()), 1_000);
        handles.network.set_online(false);
        let engine = TelemetryEngine::new(AppConfig::default_config(), platform).unwrap();

        let first = engine.start();
        let second = engine.start();
        assert_eq!(first.len(), second.len());
        assert!(engine.is_started());
        // 페이지뷰는 한 번만
        assert_eq!(engine.pending_event_names(), vec!["page_view"]);
    }

    #[test]
    fn auto_page_view_can_be_disabled() {
        let mut config = AppConfig::default_config();
        config.tracking.auto_page_view = false;
        let (platform, handles) =
            Platform::headless(page(), Arc::new(RecordingEventSink::new()), 1_000);
        handles.network.set_online(false);
        let engine = TelemetryEngine::new(config, platform).unwrap();

        engine.start();
        assert_eq!(engine.queue_stats().length, 0);
    }

    #[tokio::test]
    async fn tick_reports_vitals_once_after_delay() {
        let (platform, handles) =
            Platform::headless(page(), Arc::new(RecordingEventSink::new()), 1_000);
        handles.network.set_online(false);
        let engine = TelemetryEngine::new(AppConfig::default_config(), platform).unwrap();
        engine.start();
        handles.performance.emit_vital(MetricKind::Lcp, 2_000.0);

        engine.tick().await;
        assert!(!engine.pending_event_names().contains(&"web_vitals".to_string()));

        handles.clock.advance(5_000);
        engine.tick().await;
        engine.tick().await;
        let reports = engine
            .pending_event_names()
            .into_iter()
            .filter(|name| name == "web_vitals")
            .count();
        assert_eq!(reports, 1);
    }

    #[test]
    fn page_hide_stops_collection() {
        let (platform, handles) =
            Platform::headless(page(), Arc::new(RecordingEventSink::new()), 1_000);
        handles.network.set_online(false);
        let engine = TelemetryEngine::new(AppConfig::default_config(), platform).unwrap();
        engine.start();

        assert_eq!(engine.handle_page_hide(false), 0);
        // 중지 후 도착한 값은 스냅샷에 반영되지 않음
        handles.performance.emit_vital(MetricKind::Lcp, 9_000.0);
        assert_eq!(engine.performance_rating().breakdown.len(), 0);
        assert_eq!(handles.performance.observer_count(), 0);
    }

    #[test]
    fn bfcache_restore_resumes_collection() {
        let (platform, handles) =
            Platform::headless(page(), Arc::new(RecordingEventSink::new()), 1_000);
        handles.network.set_online(false);
        let engine = TelemetryEngine::new(AppConfig::default_config(), platform).unwrap();
        engine.start();

        engine.handle_page_hide(false);
        assert!(engine.handle_page_show(false).is_none());
        let capabilities = engine.handle_page_show(true).unwrap();
        assert_eq!(capabilities.active_count(), 9);

        handles.performance.emit_vital(MetricKind::Lcp, 5_000.0);
        assert_eq!(engine.performance_rating().breakdown.len(), 1);
        assert_eq!(engine.mitigation_stats(MetricKind::Lcp).runs, 1);
    }

    #[test]
    fn persisted_page_hide_keeps_collecting() {
        let (platform, handles) =
            Platform::headless(page(), Arc::new(RecordingEventSink::new()), 1_000);
        handles.network.set_online(false);
        let engine = TelemetryEngine::new(AppConfig::default_config(), platform).unwrap();
        engine.start();

        engine.handle_page_hide(true);
        handles.performance.emit_vital(MetricKind::Cls, 0.05);
        assert_eq!(engine.performance_rating().breakdown.len(), 1);
        assert_eq!(handles.performance.observer_count(), 4);
    }

    #[test]
    fn restart_via_start_after_page_hide() {
        let (platform, handles) =
            Platform::headless(page(), Arc::new(RecordingEventSink::new()), 1_000);
        handles.network.set_online(false);
        let engine = TelemetryEngine::new(AppConfig::default_config(), platform).unwrap();
        engine.start();
        engine.handle_page_hide(false);

        engine.start();
        handles.performance.emit_vital(MetricKind::Lcp, 5_000.0);
        assert_eq!(engine.mitigation_stats(MetricKind::Lcp).runs, 1);
        // 재시작은 페이지뷰를 다시 보내지 않음
        assert_eq!(
            engine
                .pending_event_names()
                .iter()
                .filter(|name| *name == "page_view")
                .count(),
            1
        );
    }

    #[test]
    fn observed_entries_and_custom_metrics_are_tracked() {
        let (platform, handles) =
            Platform::headless(page(), Arc::new(RecordingEventSink::new()), 1_000);
        handles.network.set_online(false);
        let engine = TelemetryEngine::new(AppConfig::default_config(), platform).unwrap();
        engine.start();

        handles.performance.emit_entries(
            EntryType::Longtask,
            vec![PerformanceEntry {
                name: "self".into(),
                duration: 90.0,
                ..PerformanceEntry::default()
            }],
        );
        handles.performance.emit_entries(
            EntryType::LargestContentfulPaint,
            vec![PerformanceEntry {
                start_time: 1_200.0,
                element: Some("IMG".into()),
                ..PerformanceEntry::default()
            }],
        );
        engine.mark("filters-open");
        handles.clock.advance(40);
        let elapsed = engine.measure("filters", "filters-open", None);
        engine.report_metric("filters", elapsed, None);

        assert_eq!(elapsed, 40.0);
        assert_eq!(engine.measure("filters", "missing", None), 0.0);
        assert_eq!(
            engine.pending_event_names(),
            vec![
                "page_view",
                "long_task",
                "largest_contentful_paint",
                "performance_metric"
            ]
        );
    }
}
