//! 엔진 시나리오 통합 테스트.
//!
//! 헤드리스 플랫폼 위에서 분류 → 완화 → 등급, 오프라인 큐 → 재연결 flush 흐름 검증.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use pagepulse_app::platform::{HeadlessHandles, Platform, RecordingEventSink};
use pagepulse_app::TelemetryEngine;
use pagepulse_core::config::AppConfig;
use pagepulse_core::error::CoreError;
use pagepulse_core::models::event::{Event, Params};
use pagepulse_core::models::metric::{Level, MetricKind};
use pagepulse_core::models::performance::EntryType;
use pagepulse_core::ports::page::StaticPage;
use pagepulse_core::ports::sink::EventSink;
use pagepulse_mitigation::memory_dom::MemoryElement;
use pagepulse_network::http_sink::HttpEventSink;
use pagepulse_storage::memory::MemoryStore;
use pagepulse_vitals::capability::{Capability, SubscriptionStatus};
use pagepulse_vitals::classifier::classify;
use pagepulse_vitals::scripted::ScriptedPerformance;
use parking_lot::Mutex;

fn page() -> StaticPage {
    StaticPage {
        url: "https://shop.example.com/collections/doors".into(),
        hostname: "shop.example.com".into(),
        referrer: String::new(),
        user_agent: "Mozilla/5.0 (Macintosh)".into(),
        title: "Doors".into(),
    }
}

fn config_without_page_view() -> AppConfig {
    let mut config = AppConfig::default_config();
    config.tracking.auto_page_view = false;
    config
}

fn engine_with(
    config: AppConfig,
    sink: Arc<dyn EventSink>,
    online: bool,
) -> (TelemetryEngine, HeadlessHandles) {
    let (platform, handles) = Platform::headless(page(), sink, 1_700_000_000_000);
    handles.network.set_online(online);
    let engine = TelemetryEngine::new(config, platform).unwrap();
    (engine, handles)
}

/// 지정한 이벤트 이름은 실패시키고 시도 순서를 기록하는 싱크
#[derive(Default)]
struct FlakySink {
    failing: HashSet<String>,
    attempts: Mutex<Vec<String>>,
}

#[async_trait]
impl EventSink for FlakySink {
    async fn deliver(&self, event: &Event) -> Result<(), CoreError> {
        self.attempts.lock().push(event.name.clone());
        if self.failing.contains(&event.name) {
            return Err(CoreError::ServiceUnavailable("maintenance".into()));
        }
        Ok(())
    }
}

#[test]
fn scenario_a_poor_lcp_mitigates_once() {
    let sink = Arc::new(RecordingEventSink::new());
    let (engine, handles) = engine_with(config_without_page_view(), sink, false);
    handles.dom.insert(
        MemoryElement::new("link")
            .attr("rel", "stylesheet")
            .attr("href", "/css/theme.css"),
    );
    engine.start();

    let classification = classify(MetricKind::Lcp, 5_200.0).unwrap();
    assert_eq!(classification.level, Level::Poor);
    assert!((classification.score - 85.0).abs() < 1e-9);

    handles.performance.emit_vital(MetricKind::Lcp, 5_200.0);

    assert_eq!(engine.mitigation_stats(MetricKind::Lcp).runs, 1);
    assert_eq!(engine.mitigation_stats(MetricKind::Cls).runs, 0);
    assert_eq!(engine.stats().observers.mitigations_requested, 1);

    let rating = engine.performance_rating();
    assert_eq!(rating.breakdown.len(), 1);
    assert_eq!(rating.breakdown[0].level, Level::Poor);
}

#[test]
fn scenario_b_good_cls_does_not_mitigate() {
    let sink = Arc::new(RecordingEventSink::new());
    let (engine, handles) = engine_with(config_without_page_view(), sink, false);
    let img = handles.dom.insert(MemoryElement::new("img").natural_size(10, 10));
    engine.start();

    handles.performance.emit_vital(MetricKind::Cls, 0.05);

    let rating = engine.performance_rating();
    assert_eq!(rating.breakdown[0].level, Level::Good);
    assert_eq!(rating.breakdown[0].score, 100.0);
    assert_eq!(engine.mitigation_stats(MetricKind::Cls).runs, 0);
    assert_eq!(handles.dom.states()[img.0 as usize].attrs.get("width"), None);
}

#[tokio::test]
async fn scenario_c_offline_queue_flushes_in_order() {
    let sink = Arc::new(FlakySink {
        failing: ["e2", "e4"].iter().map(|s| s.to_string()).collect(),
        ..FlakySink::default()
    });
    let (engine, handles) = engine_with(config_without_page_view(), sink.clone(), false);
    engine.start();

    for name in ["e1", "e2", "e3", "e4", "e5"] {
        engine.track_event(name, Params::new());
    }
    assert_eq!(engine.queue_stats().length, 5);
    assert!(sink.attempts.lock().is_empty());

    handles.network.set_online(true);
    let report = engine.flush().await;

    assert_eq!(report.attempted, 5);
    assert_eq!(report.delivered, 3);
    assert_eq!(*sink.attempts.lock(), vec!["e1", "e2", "e3", "e4", "e5"]);
    assert_eq!(engine.pending_event_names(), vec!["e2", "e4"]);
}

#[test]
fn scenario_d_fcp_boundary_is_good() {
    let sink = Arc::new(RecordingEventSink::new());
    let (engine, handles) = engine_with(config_without_page_view(), sink, false);
    engine.start();

    handles.performance.emit_vital(MetricKind::Fcp, 1_800.0);

    let rating = engine.performance_rating();
    assert_eq!(rating.breakdown[0].level, Level::Good);
    assert_eq!(rating.breakdown[0].score, 100.0);
    assert_eq!(rating.score, 100.0);
}

#[test]
fn offline_tracking_never_touches_the_network() {
    let sink = Arc::new(FlakySink::default());
    let (engine, _handles) = engine_with(AppConfig::default_config(), sink.clone(), false);
    engine.start();

    engine.track_event("cta_click", Params::new());

    assert_eq!(engine.pending_event_names(), vec!["page_view", "cta_click"]);
    assert!(sink.attempts.lock().is_empty());
}

#[test]
fn unsupported_observer_is_reported_not_fatal() {
    let sink = Arc::new(RecordingEventSink::new());
    let (mut platform, handles) = Platform::headless(page(), sink, 1_700_000_000_000);
    handles.network.set_online(false);
    let performance = Arc::new(
        ScriptedPerformance::new().with_unsupported(Capability::Observer(EntryType::Longtask)),
    );
    platform.performance = performance.clone();
    let engine = TelemetryEngine::new(config_without_page_view(), platform).unwrap();

    let capabilities = engine.start();

    assert_eq!(
        capabilities.status(Capability::Observer(EntryType::Longtask)),
        Some(&SubscriptionStatus::Unsupported)
    );
    assert!(capabilities.is_active(Capability::Vital(MetricKind::Lcp)));
    assert!(performance.emit_vital(MetricKind::Lcp, 1_000.0));
    assert_eq!(engine.performance_rating().breakdown.len(), 1);
}

#[test]
fn identity_survives_engine_restart() {
    let sink = Arc::new(RecordingEventSink::new());
    let (platform, handles) = Platform::headless(page(), sink.clone(), 1_700_000_000_000);
    handles.network.set_online(false);
    let first = TelemetryEngine::new(config_without_page_view(), platform).unwrap();
    first.start();
    let session_id = first.session_id();

    // 같은 저장소로 새 엔진 (페이지 이동)
    let (mut platform, _) = Platform::headless(page(), sink, 1_700_000_060_000);
    platform.durable = handles.durable.clone();
    platform.ephemeral = handles.ephemeral.clone();
    let second = TelemetryEngine::new(config_without_page_view(), platform).unwrap();
    second.start();

    assert_eq!(second.session_id(), session_id);
    assert!(session_id.starts_with("session_1700000000000_"));
}

#[test]
fn identity_falls_back_when_storage_unavailable() {
    let sink = Arc::new(RecordingEventSink::new());
    let (mut platform, _) = Platform::headless(page(), sink, 1_700_000_000_000);
    platform.durable = Arc::new(MemoryStore::unavailable());
    platform.ephemeral = Arc::new(MemoryStore::unavailable());
    let engine = TelemetryEngine::new(config_without_page_view(), platform).unwrap();

    engine.start();
    let a = engine.session_id();
    let b = engine.session_id();
    // 저장할 곳이 없으면 호출마다 새 ID
    assert_ne!(a, b);
}

#[tokio::test]
async fn events_reach_collector_over_http() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/analytics/events")
        .with_status(204)
        .expect(2)
        .create_async()
        .await;

    let mut config = AppConfig::default_config();
    config.collector.base_url = server.url();
    let sink = Arc::new(HttpEventSink::new(&config.collector).unwrap());
    let (engine, handles) = engine_with(config, sink, false);
    engine.start();
    engine.track_event("cta_click", Params::new());

    handles.network.set_online(true);
    let report = engine.flush().await;

    assert_eq!(report.delivered, 2);
    assert_eq!(engine.queue_stats().length, 0);
    mock.assert_async().await;
}
