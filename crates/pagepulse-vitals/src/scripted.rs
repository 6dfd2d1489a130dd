//! 스크립트 구동 성능 소스.
//!
//! 브라우저 없이 vitals 콜백과 Observer 엔트리를 직접 주입한다.
//! 테스트와 `pagepulse-replay` 바이너리에서 사용.

use std::collections::HashMap;

use parking_lot::Mutex;
use pagepulse_core::error::CoreError;
use pagepulse_core::models::metric::MetricKind;
use pagepulse_core::models::performance::{EntryType, PerformanceEntry, VitalReport};
use pagepulse_core::ports::performance::{EntryListCallback, PerformanceSource, VitalCallback};

use crate::capability::Capability;

/// 수동 주입 성능 소스
#[derive(Default)]
pub struct ScriptedPerformance {
    vitals: Mutex<HashMap<MetricKind, VitalCallback>>,
    observers: Mutex<HashMap<EntryType, EntryListCallback>>,
    /// 구독 시 돌려줄 에러 사유 (None이면 미지원)
    refusals: Mutex<HashMap<Capability, Option<String>>>,
}

impl ScriptedPerformance {
    pub fn new() -> Self {
        Self::default()
    }

    /// 해당 구독을 미지원으로 표시
    pub fn with_unsupported(self, capability: Capability) -> Self {
        self.refusals.lock().insert(capability, None);
        self
    }

    /// 해당 구독이 에러로 실패하도록 표시
    pub fn with_failure(self, capability: Capability, reason: &str) -> Self {
        self.refusals
            .lock()
            .insert(capability, Some(reason.to_string()));
        self
    }

    fn refusal(&self, capability: Capability) -> Result<(), CoreError> {
        match self.refusals.lock().get(&capability) {
            None => Ok(()),
            Some(None) => Err(CoreError::ObserverUnsupported(capability.to_string())),
            Some(Some(reason)) => Err(CoreError::Internal(reason.clone())),
        }
    }

    /// vitals 값 주입. 구독자가 없으면 false
    pub fn emit_vital(&self, kind: MetricKind, value: f64) -> bool {
        let callback = self.vitals.lock().get(&kind).cloned();
        match callback {
            Some(callback) => {
                callback(VitalReport::new(kind.as_str(), value));
                true
            }
            None => false,
        }
    }

    /// Observer 엔트리 목록 주입. 구독자가 없으면 false
    pub fn emit_entries(&self, entry_type: EntryType, entries: Vec<PerformanceEntry>) -> bool {
        let callback = self.observers.lock().get(&entry_type).cloned();
        match callback {
            Some(callback) => {
                callback(entries);
                true
            }
            None => false,
        }
    }

    /// 현재 등록된 vitals 콜백 (재구독 전 콜백을 붙잡아 두는 용도)
    pub fn vital_callback(&self, kind: MetricKind) -> Option<VitalCallback> {
        self.vitals.lock().get(&kind).cloned()
    }

    /// 활성 Observer 수
    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }
}

impl PerformanceSource for ScriptedPerformance {
    fn on_vital(&self, kind: MetricKind, callback: VitalCallback) -> Result<(), CoreError> {
        self.refusal(Capability::Vital(kind))?;
        self.vitals.lock().insert(kind, callback);
        Ok(())
    }

    fn observe(
        &self,
        entry_type: EntryType,
        callback: EntryListCallback,
    ) -> Result<(), CoreError> {
        self.refusal(Capability::Observer(entry_type))?;
        self.observers.lock().insert(entry_type, callback);
        Ok(())
    }

    fn disconnect(&self) {
        self.observers.lock().clear();
    }
}
