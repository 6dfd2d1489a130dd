//! 완화 실행기.
//!
//! `MitigationSink` 구현. 수집기의 완화 요청을 받아 지표별 루틴을 실행한다.
//! 루틴 단계마다 독립적으로 실패를 처리하며, 에러는 로그만 남기고 삼킨다.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use pagepulse_core::config::MitigationConfig;
use pagepulse_core::error::CoreError;
use pagepulse_core::models::metric::MetricKind;
use pagepulse_core::models::mitigation::MitigationRequest;
use pagepulse_core::ports::dom::DomAccessor;
use pagepulse_core::ports::mitigation::MitigationSink;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::routines;

/// 지표별 실행 통계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MitigationStats {
    /// 실행 횟수
    pub runs: u64,
    /// 변경한 항목 수 합계
    pub changes: u64,
    /// 실패한 단계 수
    pub failed_steps: u64,
}

/// DOM 완화 실행기
pub struct MitigationExecutor {
    config: MitigationConfig,
    dom: Arc<dyn DomAccessor>,
    enabled: AtomicBool,
    idle_hook_scheduled: AtomicBool,
    stats: Mutex<BTreeMap<MetricKind, MitigationStats>>,
}

impl MitigationExecutor {
    pub fn new(config: MitigationConfig, dom: Arc<dyn DomAccessor>) -> Self {
        let enabled = config.enabled;
        Self {
            config,
            dom,
            enabled: AtomicBool::new(enabled),
            idle_hook_scheduled: AtomicBool::new(false),
            stats: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
        info!(enabled, "DOM 완화 설정 변경");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// 지표별 통계
    pub fn stats(&self, kind: MetricKind) -> MitigationStats {
        self.stats.lock().get(&kind).copied().unwrap_or_default()
    }

    /// 지표에 해당하는 루틴 실행. 변경한 항목 수 반환.
    ///
    /// FCP/TTFB 등 완화 대상이 아닌 지표는 0.
    pub fn apply(&self, kind: MetricKind) -> usize {
        let steps: Vec<(&str, Result<usize, CoreError>)> = match kind {
            MetricKind::Lcp => vec![
                (
                    "preload",
                    routines::preload_critical_assets(self.dom.as_ref(), &self.config),
                ),
                (
                    "largest_image",
                    routines::prioritize_largest_image(self.dom.as_ref()),
                ),
                (
                    "defer_css",
                    routines::defer_non_critical_css(self.dom.as_ref(), &self.config),
                ),
            ],
            MetricKind::Fid => vec![
                ("idle_hook", self.schedule_idle_hook()),
                (
                    "defer_scripts",
                    routines::defer_non_critical_scripts(self.dom.as_ref()),
                ),
            ],
            MetricKind::Cls => vec![
                (
                    "image_dimensions",
                    routines::ensure_image_dimensions(self.dom.as_ref()),
                ),
                (
                    "dynamic_space",
                    routines::reserve_dynamic_space(self.dom.as_ref(), &self.config),
                ),
                (
                    "content_containers",
                    routines::anchor_content_containers(self.dom.as_ref(), &self.config),
                ),
            ],
            MetricKind::Fcp | MetricKind::Ttfb => return 0,
        };

        let mut changes = 0usize;
        let mut failed = 0u64;
        for (step, result) in steps {
            match result {
                Ok(count) => {
                    debug!(metric = %kind, step, count, "완화 단계 완료");
                    changes += count;
                }
                Err(e) => {
                    warn!(metric = %kind, step, error = %e, "완화 단계 실패");
                    failed += 1;
                }
            }
        }

        {
            let mut stats = self.stats.lock();
            let entry = stats.entry(kind).or_default();
            entry.runs += 1;
            entry.changes += changes as u64;
            entry.failed_steps += failed;
        }

        info!(metric = %kind, changes, "DOM 완화 적용");
        changes
    }

    /// 유휴 시간 훅 예약 (한 번만)
    fn schedule_idle_hook(&self) -> Result<usize, CoreError> {
        if self.idle_hook_scheduled.swap(true, Ordering::SeqCst) {
            return Ok(0);
        }
        let result = self.dom.request_idle(Box::new(|| {
            debug!("유휴 시간 작업 실행");
        }));
        match result {
            Ok(()) => Ok(1),
            Err(CoreError::ObserverUnsupported(_)) => {
                debug!("requestIdleCallback 미지원, 유휴 훅 생략");
                Ok(0)
            }
            Err(e) => {
                self.idle_hook_scheduled.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }
}

impl MitigationSink for MitigationExecutor {
    fn request(&self, request: MitigationRequest) {
        if !self.is_enabled() {
            debug!(metric = %request.kind, "DOM 완화 비활성, 요청 무시");
            return;
        }
        if !request.kind.is_mitigable() {
            return;
        }
        warn!(metric = %request.kind, value = request.value, "불량 지표 완화 실행");
        self.apply(request.kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_dom::{MemoryDom, MemoryElement};
    use pagepulse_core::ports::dom::Rect;

    fn request(kind: MetricKind, value: f64) -> MitigationRequest {
        MitigationRequest { kind, value }
    }

    /// 기본 프리로드 목록 없는 설정
    fn without_preloads() -> MitigationConfig {
        MitigationConfig {
            critical_assets: Vec::new(),
            ..MitigationConfig::default()
        }
    }

    #[test]
    fn empty_dom_is_unchanged_for_every_routine() {
        let dom = Arc::new(MemoryDom::new(800.0).without_idle_callback());
        let executor = MitigationExecutor::new(without_preloads(), dom.clone());

        for kind in MetricKind::ALL {
            assert_eq!(executor.apply(kind), 0);
        }
        assert!(dom.is_empty());
        assert_eq!(executor.stats(MetricKind::Cls).failed_steps, 0);
    }

    #[test]
    fn populated_dom_without_matches_is_unchanged() {
        let dom = Arc::new(MemoryDom::new(800.0));
        dom.insert(MemoryElement::new("p").attr("class", "intro"));
        dom.insert(
            MemoryElement::new("img")
                .attr("width", "10")
                .attr("height", "10")
                .attr("loading", "lazy")
                .rect(Rect::new(0.0, 0.0, 10.0, 10.0)),
        );
        let before = dom.states();

        let executor = MitigationExecutor::new(without_preloads(), dom.clone());
        executor.request(request(MetricKind::Lcp, 6_000.0));
        executor.request(request(MetricKind::Cls, 0.4));

        assert_eq!(dom.states(), before);
    }

    #[test]
    fn default_lcp_run_preloads_font_and_hero() {
        let dom = Arc::new(MemoryDom::new(800.0));
        let executor = MitigationExecutor::new(MitigationConfig::default(), dom.clone());

        executor.request(request(MetricKind::Lcp, 5_000.0));
        assert_eq!(executor.stats(MetricKind::Lcp).changes, 2);
        assert_eq!(dom.len(), 2);
    }

    #[test]
    fn idle_hook_is_scheduled_once() {
        let dom = Arc::new(MemoryDom::new(800.0));
        dom.insert(MemoryElement::new("script").attr("src", "/widget.js"));
        let executor = MitigationExecutor::new(MitigationConfig::default(), dom.clone());

        assert_eq!(executor.apply(MetricKind::Fid), 2);
        assert_eq!(executor.apply(MetricKind::Fid), 0);
        assert_eq!(dom.pending_idle(), 1);
        assert_eq!(dom.run_idle(), 1);

        let stats = executor.stats(MetricKind::Fid);
        assert_eq!(stats.runs, 2);
        assert_eq!(stats.changes, 2);
    }

    #[test]
    fn disabled_executor_ignores_requests() {
        let dom = Arc::new(MemoryDom::new(800.0));
        dom.insert(MemoryElement::new("section").attr("class", "content-container"));
        let executor = MitigationExecutor::new(MitigationConfig::default(), dom.clone());
        executor.set_enabled(false);

        executor.request(request(MetricKind::Cls, 0.9));
        assert_eq!(executor.stats(MetricKind::Cls).runs, 0);

        executor.set_enabled(true);
        executor.request(request(MetricKind::Cls, 0.9));
        assert_eq!(executor.stats(MetricKind::Cls).changes, 1);
    }

    #[test]
    fn invalid_selector_fails_only_its_step() {
        let dom = Arc::new(MemoryDom::new(800.0));
        dom.insert(MemoryElement::new("div").attr("data-lazy", ""));
        let mut config = MitigationConfig::default();
        config.content_container_selector = "main .content".into();
        let executor = MitigationExecutor::new(config, dom.clone());

        assert_eq!(executor.apply(MetricKind::Cls), 1);
        assert_eq!(executor.stats(MetricKind::Cls).failed_steps, 1);
    }

    #[test]
    fn config_can_start_disabled() {
        let mut config = MitigationConfig::default();
        config.enabled = false;
        let executor = MitigationExecutor::new(config, Arc::new(MemoryDom::new(800.0)));
        assert!(!executor.is_enabled());
    }
}
