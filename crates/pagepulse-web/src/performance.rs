//! 브라우저 성능 소스.
//!
//! - vitals: 페이지에 로드된 `web-vitals` 라이브러리 (`window.webVitals`)의
//!   `onLCP`/`onFID`/... (구버전은 `getLCP`/...) 콜백 등록
//! - Observer: `PerformanceObserver` + `supportedEntryTypes` 확인
//!
//! 라이브러리나 엔트리 유형이 없으면 `ObserverUnsupported`로 보고한다.

use std::cell::RefCell;

use js_sys::{Array, Function, Object, Reflect};
use pagepulse_core::error::CoreError;
use pagepulse_core::models::metric::MetricKind;
use pagepulse_core::models::performance::{EntryType, PerformanceEntry, VitalReport};
use pagepulse_core::ports::performance::{EntryListCallback, PerformanceSource, VitalCallback};
use tracing::debug;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{PerformanceObserver, PerformanceObserverEntryList, PerformanceObserverInit};

use crate::js::{describe, get, window};

type ObserverClosure = Closure<dyn FnMut(PerformanceObserverEntryList, PerformanceObserver)>;

thread_local! {
    static OBSERVERS: RefCell<Vec<(PerformanceObserver, ObserverClosure)>> = RefCell::new(Vec::new());
    static VITAL_CALLBACKS: RefCell<Vec<Closure<dyn FnMut(JsValue)>>> = RefCell::new(Vec::new());
}

/// `web-vitals` + `PerformanceObserver`
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserPerformance;

impl BrowserPerformance {
    fn vitals_function(kind: MetricKind) -> Result<Function, CoreError> {
        let window = window()?;
        let library = get(window.as_ref(), "webVitals");
        if library.is_undefined() || library.is_null() {
            return Err(CoreError::ObserverUnsupported("web-vitals 미로드".into()));
        }
        [format!("on{}", kind.as_str()), format!("get{}", kind.as_str())]
            .iter()
            .find_map(|name| get(&library, name).dyn_into::<Function>().ok())
            .ok_or_else(|| CoreError::ObserverUnsupported(format!("web-vitals {kind} 미지원")))
    }

    fn supports(entry_type: EntryType) -> Result<(), CoreError> {
        let window = window()?;
        let constructor = get(window.as_ref(), "PerformanceObserver");
        if constructor.is_undefined() {
            return Err(CoreError::ObserverUnsupported("PerformanceObserver".into()));
        }
        let supported = get(&constructor, "supportedEntryTypes");
        // supportedEntryTypes가 없는 구형 브라우저는 observe 시도로 판단
        if let Some(list) = supported.dyn_ref::<Array>() {
            if !list.includes(&JsValue::from_str(entry_type.as_str()), 0) {
                return Err(CoreError::ObserverUnsupported(entry_type.to_string()));
            }
        }
        Ok(())
    }
}

/// 엔트리 → 모델 (layout-shift/resource/LCP 전용 필드는 Reflect로)
fn to_entry(value: &JsValue) -> Option<PerformanceEntry> {
    let entry = value.dyn_ref::<web_sys::PerformanceEntry>()?;
    Some(PerformanceEntry {
        name: entry.name(),
        start_time: entry.start_time(),
        duration: entry.duration(),
        value: get(value, "value").as_f64(),
        had_recent_input: get(value, "hadRecentInput").as_bool().unwrap_or(false),
        transfer_size: get(value, "transferSize").as_f64().map(|size| size as u64),
        element: get(&get(value, "element"), "tagName").as_string(),
    })
}

impl PerformanceSource for BrowserPerformance {
    fn on_vital(&self, kind: MetricKind, callback: VitalCallback) -> Result<(), CoreError> {
        let register = Self::vitals_function(kind)?;
        let closure = Closure::wrap(Box::new(move |metric: JsValue| {
            let name = get(&metric, "name").as_string().unwrap_or_else(|| kind.to_string());
            if let Some(value) = get(&metric, "value").as_f64() {
                callback(VitalReport::new(name, value));
            }
        }) as Box<dyn FnMut(JsValue)>);

        register
            .call1(&JsValue::NULL, closure.as_ref())
            .map_err(|e| CoreError::Internal(describe(&e)))?;
        VITAL_CALLBACKS.with(|callbacks| callbacks.borrow_mut().push(closure));
        Ok(())
    }

    fn observe(&self, entry_type: EntryType, callback: EntryListCallback) -> Result<(), CoreError> {
        Self::supports(entry_type)?;

        let closure: ObserverClosure = Closure::wrap(Box::new(
            move |list: PerformanceObserverEntryList, _observer: PerformanceObserver| {
                let entries: Vec<PerformanceEntry> =
                    list.get_entries().iter().filter_map(|e| to_entry(&e)).collect();
                if !entries.is_empty() {
                    callback(entries);
                }
            },
        )
            as Box<dyn FnMut(PerformanceObserverEntryList, PerformanceObserver)>);
        let observer = PerformanceObserver::new(closure.as_ref().unchecked_ref())
            .map_err(|e| CoreError::ObserverUnsupported(describe(&e)))?;

        let options = Object::new();
        let types: Array = std::iter::once(JsValue::from_str(entry_type.as_str())).collect();
        Reflect::set(&options, &JsValue::from_str("entryTypes"), &types)
            .map_err(|e| CoreError::Internal(describe(&e)))?;
        observer.observe(options.unchecked_ref::<PerformanceObserverInit>());

        OBSERVERS.with(|observers| observers.borrow_mut().push((observer, closure)));
        debug!(%entry_type, "PerformanceObserver 등록");
        Ok(())
    }

    fn disconnect(&self) {
        OBSERVERS.with(|observers| {
            for (observer, _closure) in observers.borrow_mut().drain(..) {
                observer.disconnect();
            }
        });
    }
}
