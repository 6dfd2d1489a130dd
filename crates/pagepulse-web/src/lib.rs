//! PAGEPULSE 브라우저 어댑터.
//!
//! web-sys로 코어 포트를 구현하고 페이지 스크립트가 호출하는 JS API를 노출한다.
//!
//! ```js
//! import init, { start, trackEvent, performanceRating } from "./pagepulse_web.js";
//! await init();
//! start({ analytics_backend_id: "G-XXXX", collector: { base_url: "" } });
//! ```
#![cfg(target_arch = "wasm32")]

pub mod dom;
pub mod env;
pub mod js;
pub mod listeners;
pub mod logging;
pub mod performance;
pub mod sinks;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use pagepulse_app::{Platform, TelemetryEngine};
use pagepulse_core::config::AppConfig;
use pagepulse_core::error::CoreError;
use pagepulse_core::models::event::{Conversion, Params};
use pagepulse_core::ports::sink::ThirdPartySink;
use tracing::{info, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;

use crate::dom::BrowserDom;
use crate::env::{page_origin, BrowserClock, BrowserNetwork, BrowserPage, BrowserStore};
use crate::js::{from_js, to_js, window};
use crate::performance::BrowserPerformance;
use crate::sinks::{BrowserEventSink, GtagSink, LinkedInSink, MetaPixelSink};

/// 주기 작업 (vitals 리포트 + 백오프 flush) 간격
const TICK_INTERVAL_MS: i32 = 5_000;

thread_local! {
    static ENGINE: RefCell<Option<Rc<TelemetryEngine>>> = const { RefCell::new(None) };
}

fn js_error(e: CoreError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn engine() -> Result<Rc<TelemetryEngine>, JsValue> {
    ENGINE
        .with(|engine| engine.borrow().clone())
        .ok_or_else(|| JsValue::from_str("pagepulse: start()가 호출되지 않음"))
}

/// JSON 문자열 또는 객체 → 설정. 생략 시 기본값
fn parse_config(value: &JsValue) -> Result<AppConfig, CoreError> {
    if let Some(json) = value.as_string() {
        return AppConfig::from_json(&json);
    }
    if value.is_undefined() || value.is_null() {
        return Ok(AppConfig::default_config());
    }
    from_js(value)
}

fn browser_platform(config: &AppConfig) -> Result<Platform, CoreError> {
    let third_party: Vec<Arc<dyn ThirdPartySink>> = vec![
        Arc::new(GtagSink::new(config.analytics_backend_id.clone())),
        Arc::new(MetaPixelSink),
        Arc::new(LinkedInSink),
    ];
    Ok(Platform {
        clock: Arc::new(BrowserClock),
        durable: Arc::new(BrowserStore::local()),
        ephemeral: Arc::new(BrowserStore::session()),
        network: Arc::new(BrowserNetwork),
        page: Arc::new(BrowserPage),
        dom: Arc::new(BrowserDom),
        performance: Arc::new(BrowserPerformance),
        sink: Arc::new(BrowserEventSink::new(&config.collector)?),
        third_party,
    })
}

fn schedule_ticks(engine: Rc<TelemetryEngine>) -> Result<(), CoreError> {
    let callback = Closure::<dyn FnMut()>::new(move || {
        let engine = engine.clone();
        wasm_bindgen_futures::spawn_local(async move {
            engine.tick().await;
        });
    });
    window()?
        .set_interval_with_callback_and_timeout_and_arguments_0(
            callback.as_ref().unchecked_ref(),
            TICK_INTERVAL_MS,
        )
        .map_err(|e| CoreError::Internal(js::describe(&e)))?;
    callback.forget();
    Ok(())
}

/// 엔진 시작. 설정은 `AppConfig` 형태의 JSON 문자열 또는 객체 (생략 시 기본값)
///
/// 구독 결과(capabilities)를 반환한다. 두 번째 호출은 기존 엔진의 결과를 돌려준다.
#[wasm_bindgen]
pub fn start(config: JsValue, log_level: Option<String>) -> Result<JsValue, JsValue> {
    logging::init_console_tracing(log_level.as_deref().unwrap_or("info"));

    if let Some(existing) = ENGINE.with(|engine| engine.borrow().clone()) {
        warn!("이미 시작된 엔진");
        return to_js(&existing.start()).map_err(js_error);
    }

    let mut config = parse_config(&config).map_err(js_error)?;
    // 기본값(빈 URL)은 같은 origin 수집
    if let Some(origin) = page_origin() {
        config.collector.resolve_origin(&origin);
    }

    let platform = browser_platform(&config).map_err(js_error)?;
    let engine = Rc::new(TelemetryEngine::new(config, platform).map_err(js_error)?);
    let capabilities = engine.start();

    listeners::install(engine.clone()).map_err(js_error)?;
    schedule_ticks(engine.clone()).map_err(js_error)?;
    ENGINE.with(|slot| *slot.borrow_mut() = Some(engine));

    info!("브라우저 엔진 준비 완료");
    to_js(&capabilities).map_err(js_error)
}

/// 커스텀 이벤트. 파라미터는 JSON 문자열 또는 객체
#[wasm_bindgen(js_name = trackEvent)]
pub fn track_event(name: &str, params: JsValue) -> Result<(), JsValue> {
    let params: Params = match params.as_string() {
        Some(json) => serde_json::from_str(&json).map_err(|e| js_error(e.into()))?,
        None if params.is_undefined() || params.is_null() => Params::new(),
        None => from_js(&params).map_err(js_error)?,
    };
    engine()?.track_event(name, params);
    Ok(())
}

/// 페이지뷰 (SPA 라우트 변경 등)
#[wasm_bindgen(js_name = trackPageView)]
pub fn track_page_view(url: Option<String>, title: Option<String>) -> Result<(), JsValue> {
    engine()?.track_page_view(url.as_deref(), title.as_deref());
    Ok(())
}

/// 전환 (`{ kind, value, currency, items, metadata }`)
#[wasm_bindgen(js_name = trackConversion)]
pub fn track_conversion(conversion: JsValue) -> Result<(), JsValue> {
    let conversion: Conversion = from_js(&conversion).map_err(js_error)?;
    engine()?.track_conversion(conversion);
    Ok(())
}

/// 사용자 ID 설정. `null`이면 해제
#[wasm_bindgen(js_name = setUserId)]
pub fn set_user_id(user_id: Option<String>) -> Result<(), JsValue> {
    engine()?.set_user_id(user_id.as_deref());
    Ok(())
}

/// 사용자 타이밍 mark
#[wasm_bindgen]
pub fn mark(name: &str) -> Result<(), JsValue> {
    engine()?.mark(name);
    Ok(())
}

/// `start_mark`부터 `end_mark`(생략 시 현재)까지 ms. 실패 시 0
#[wasm_bindgen]
pub fn measure(name: &str, start_mark: &str, end_mark: Option<String>) -> Result<f64, JsValue> {
    Ok(engine()?.measure(name, start_mark, end_mark.as_deref()))
}

/// 사용자 정의 성능 지표 (`performance_metric` 이벤트). 단위 기본값 "ms"
#[wasm_bindgen(js_name = reportMetric)]
pub fn report_metric(name: &str, value: f64, unit: Option<String>) -> Result<(), JsValue> {
    engine()?.report_metric(name, value, unit.as_deref());
    Ok(())
}

/// 현재 성능 등급
#[wasm_bindgen(js_name = performanceRating)]
pub fn performance_rating() -> Result<JsValue, JsValue> {
    to_js(&engine()?.performance_rating()).map_err(js_error)
}

/// 엔진 통계
#[wasm_bindgen]
pub fn stats() -> Result<JsValue, JsValue> {
    to_js(&engine()?.stats()).map_err(js_error)
}

/// 대기 큐 즉시 전송. flush 결과로 resolve
#[wasm_bindgen]
pub async fn flush() -> Result<JsValue, JsValue> {
    let engine = engine()?;
    let report = engine.flush().await;
    to_js(&report).map_err(js_error)
}
