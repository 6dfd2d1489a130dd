//! 트레이스 리플레이.
//!
//! 기록된 vitals 값, Observer 엔트리, 이벤트, 연결 변화를 헤드리스 엔진에 순서대로
//! 주입하고 최종 성능 등급과 전송 결과를 돌려준다.
//!
//! ```json
//! {
//!   "page": { "url": "https://shop.example.com/", "hostname": "shop.example.com" },
//!   "elements": [ { "tag": "img", "natural_size": [1200, 800] } ],
//!   "steps": [
//!     { "type": "vital", "name": "LCP", "value": 5200 },
//!     { "type": "advance", "ms": 1000 },
//!     { "type": "network", "online": false },
//!     { "type": "event", "name": "cta_click", "params": { "id": "hero" } }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use pagepulse_core::config::AppConfig;
use pagepulse_core::error::CoreError;
use pagepulse_core::models::event::Params;
use pagepulse_core::models::metric::{MetricKind, PerformanceRating};
use pagepulse_core::models::performance::{EntryType, PerformanceEntry};
use pagepulse_core::ports::dom::Rect;
use pagepulse_core::ports::page::StaticPage;
use pagepulse_core::ports::sink::EventSink;
use pagepulse_mitigation::executor::MitigationStats;
use pagepulse_mitigation::memory_dom::{ElementState, MemoryElement};
use pagepulse_network::queue::QueueStats;
use pagepulse_vitals::capability::CapabilitySet;
use pagepulse_vitals::collector::ObserverStats;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::engine::TelemetryEngine;
use crate::platform::Platform;

/// 리플레이 입력
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Trace {
    #[serde(default)]
    pub page: TracePage,
    /// 시작 시각 (epoch ms)
    #[serde(default = "default_start_millis")]
    pub start_millis: i64,
    /// 시작 시 온라인 여부
    #[serde(default = "default_online")]
    pub online: bool,
    /// 인메모리 DOM 초기 요소
    #[serde(default)]
    pub elements: Vec<TraceElement>,
    #[serde(default)]
    pub steps: Vec<TraceStep>,
}

fn default_start_millis() -> i64 {
    1_700_000_000_000
}

fn default_online() -> bool {
    true
}

/// 페이지 정보
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TracePage {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub referrer: String,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub title: String,
}

impl From<TracePage> for StaticPage {
    fn from(page: TracePage) -> Self {
        StaticPage {
            url: page.url,
            hostname: page.hostname,
            referrer: page.referrer,
            user_agent: page.user_agent,
            title: page.title,
        }
    }
}

/// DOM 요소
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TraceElement {
    pub tag: String,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    #[serde(default)]
    pub style: BTreeMap<String, String>,
    /// `[top, left, width, height]`
    #[serde(default)]
    pub rect: Option<[f64; 4]>,
    /// `[naturalWidth, naturalHeight]`
    #[serde(default)]
    pub natural_size: Option<[u32; 2]>,
    /// 이미 로드된 요소 (캐시된 스타일시트 등)
    #[serde(default)]
    pub loaded: bool,
}

impl From<TraceElement> for MemoryElement {
    fn from(element: TraceElement) -> Self {
        let mut built = MemoryElement::new(&element.tag);
        for (name, value) in &element.attrs {
            built = built.attr(name, value);
        }
        for (property, value) in &element.style {
            built = built.style(property, value);
        }
        if let Some([top, left, width, height]) = element.rect {
            built = built.rect(Rect::new(top, left, width, height));
        }
        if let Some([width, height]) = element.natural_size {
            built = built.natural_size(width, height);
        }
        if element.loaded {
            built = built.loaded();
        }
        built
    }
}

/// 리플레이 단계
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceStep {
    /// vitals 콜백 값
    Vital { name: String, value: f64 },
    /// Observer 엔트리 목록
    Entries {
        entry_type: EntryType,
        entries: Vec<PerformanceEntry>,
    },
    /// 커스텀 이벤트
    Event {
        name: String,
        #[serde(default)]
        params: Params,
    },
    /// 브라우저 온라인 상태 변경 (온라인 복귀 시 flush)
    Network { online: bool },
    /// 시계 진행
    Advance { ms: i64 },
    /// 주기 tick (backoff 준수 flush + 지연 vitals 보고)
    Tick,
    /// 페이지 언로드. `persisted`면 bfcache 진입
    PageHide {
        #[serde(default)]
        persisted: bool,
    },
    /// bfcache 복원 등 페이지 재표시
    PageShow {
        #[serde(default)]
        persisted: bool,
    },
}

/// 리플레이 결과
#[derive(Debug, Clone, Serialize)]
pub struct ReplayOutcome {
    pub rating: PerformanceRating,
    pub capabilities: Option<CapabilitySet>,
    pub observers: ObserverStats,
    pub queue: QueueStats,
    /// 큐에 남은 이벤트 이름
    pub pending: Vec<String>,
    pub mitigation: BTreeMap<String, MitigationStats>,
    pub dom: Vec<ElementState>,
}

/// 트레이스를 엔진에 재생
///
/// 온라인 상태에서 시작된 백그라운드 전송은 단계마다 정착시킨 뒤 다음 단계로 넘어간다.
pub async fn run(
    trace: Trace,
    config: AppConfig,
    sink: Arc<dyn EventSink>,
) -> Result<ReplayOutcome, CoreError> {
    let (platform, handles) = Platform::headless(trace.page.into(), sink, trace.start_millis);
    handles.network.set_online(trace.online);
    for element in trace.elements {
        handles.dom.insert(element.into());
    }

    let engine = TelemetryEngine::new(config, platform)?;
    engine.start();
    settle().await;

    for (index, step) in trace.steps.into_iter().enumerate() {
        debug!(index, ?step, "리플레이 단계");
        match step {
            TraceStep::Vital { name, value } => match name.parse::<MetricKind>() {
                Ok(kind) => {
                    handles.performance.emit_vital(kind, value);
                }
                Err(e) => warn!(index, error = %e, "알 수 없는 지표 건너뜀"),
            },
            TraceStep::Entries {
                entry_type,
                entries,
            } => {
                handles.performance.emit_entries(entry_type, entries);
            }
            TraceStep::Event { name, params } => engine.track_event(&name, params),
            TraceStep::Network { online } => {
                handles.network.set_online(online);
                if online {
                    engine.handle_online();
                }
            }
            TraceStep::Advance { ms } => handles.clock.advance(ms),
            TraceStep::Tick => {
                engine.tick().await;
            }
            TraceStep::PageHide { persisted } => {
                engine.handle_page_hide(persisted);
            }
            TraceStep::PageShow { persisted } => {
                engine.handle_page_show(persisted);
            }
        }
        settle().await;
        handles.dom.run_idle();
    }

    let mitigation = MetricKind::ALL
        .iter()
        .filter(|kind| kind.is_mitigable())
        .map(|kind| (kind.to_string(), engine.mitigation_stats(*kind)))
        .collect();

    Ok(ReplayOutcome {
        rating: engine.performance_rating(),
        capabilities: engine.capabilities(),
        observers: engine.stats().observers,
        queue: engine.queue_stats(),
        pending: engine.pending_event_names(),
        mitigation,
        dom: handles.dom.states(),
    })
}

/// 백그라운드 전송 태스크가 진행될 기회를 준다
async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
