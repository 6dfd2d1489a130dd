//! 플랫폼 어댑터 묶음.
//!
//! 엔진이 필요로 하는 포트 구현을 한곳에 모아 주입한다.
//! 브라우저는 `pagepulse-web`이, 헤드리스 호스트와 테스트는 [`Platform::headless`]가 채운다.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use pagepulse_core::error::CoreError;
use pagepulse_core::models::event::Event;
use pagepulse_core::ports::clock::Clock;
use pagepulse_core::ports::dom::DomAccessor;
use pagepulse_core::ports::network::{ManualNetworkStatus, NetworkStatus};
use pagepulse_core::ports::page::{PageContext, StaticPage};
use pagepulse_core::ports::performance::PerformanceSource;
use pagepulse_core::ports::sink::{EventSink, ThirdPartySink};
use pagepulse_core::ports::storage::KeyValueStore;
use pagepulse_mitigation::memory_dom::MemoryDom;
use pagepulse_storage::memory::MemoryStore;
use pagepulse_vitals::scripted::ScriptedPerformance;
use parking_lot::Mutex;

/// 엔진에 주입되는 포트 구현
pub struct Platform {
    pub clock: Arc<dyn Clock>,
    /// localStorage 대응
    pub durable: Arc<dyn KeyValueStore>,
    /// sessionStorage 대응
    pub ephemeral: Arc<dyn KeyValueStore>,
    pub network: Arc<dyn NetworkStatus>,
    pub page: Arc<dyn PageContext>,
    pub dom: Arc<dyn DomAccessor>,
    pub performance: Arc<dyn PerformanceSource>,
    pub sink: Arc<dyn EventSink>,
    pub third_party: Vec<Arc<dyn ThirdPartySink>>,
}

/// 헤드리스 플랫폼에서 테스트/리플레이가 직접 조작하는 핸들
#[derive(Clone)]
pub struct HeadlessHandles {
    pub clock: Arc<ManualClock>,
    pub network: Arc<ManualNetworkStatus>,
    pub dom: Arc<MemoryDom>,
    pub performance: Arc<ScriptedPerformance>,
    pub durable: Arc<MemoryStore>,
    pub ephemeral: Arc<MemoryStore>,
}

impl Platform {
    /// 인메모리 어댑터로 구성된 플랫폼
    pub fn headless(
        page: StaticPage,
        sink: Arc<dyn EventSink>,
        start_millis: i64,
    ) -> (Self, HeadlessHandles) {
        let handles = HeadlessHandles {
            clock: Arc::new(ManualClock::new(start_millis)),
            network: Arc::new(ManualNetworkStatus::new(true)),
            dom: Arc::new(MemoryDom::new(800.0)),
            performance: Arc::new(ScriptedPerformance::new()),
            durable: Arc::new(MemoryStore::new()),
            ephemeral: Arc::new(MemoryStore::new()),
        };
        let platform = Self {
            clock: handles.clock.clone(),
            durable: handles.durable.clone(),
            ephemeral: handles.ephemeral.clone(),
            network: handles.network.clone(),
            page: Arc::new(page),
            dom: handles.dom.clone(),
            performance: handles.performance.clone(),
            sink,
            third_party: Vec::new(),
        };
        (platform, handles)
    }

    /// 외부 분석 싱크 추가
    pub fn with_third_party(mut self, sink: Arc<dyn ThirdPartySink>) -> Self {
        self.third_party.push(sink);
        self
    }
}

/// 수동으로 진행하는 시계
#[derive(Debug)]
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self(AtomicI64::new(start_millis))
    }

    pub fn advance(&self, millis: i64) {
        self.0.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn set(&self, millis: i64) {
        self.0.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// 전송된 이벤트를 기록만 하는 싱크
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    delivered: Mutex<Vec<Event>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<Event> {
        self.delivered.lock().clone()
    }

    pub fn delivered_names(&self) -> Vec<String> {
        self.delivered.lock().iter().map(|e| e.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.delivered.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl EventSink for RecordingEventSink {
    async fn deliver(&self, event: &Event) -> Result<(), CoreError> {
        self.delivered.lock().push(event.clone());
        Ok(())
    }
}
