//! JS 값 변환 헬퍼.

use js_sys::{Function, Reflect, JSON};
use pagepulse_core::error::CoreError;
use wasm_bindgen::{JsCast, JsValue};

/// `window`
pub fn window() -> Result<web_sys::Window, CoreError> {
    web_sys::window().ok_or_else(|| CoreError::Internal("window 없음".into()))
}

/// `document`
pub fn document() -> Result<web_sys::Document, CoreError> {
    window()?
        .document()
        .ok_or_else(|| CoreError::Internal("document 없음".into()))
}

/// JS 예외 → 문자열
pub fn describe(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            value
                .dyn_ref::<js_sys::Error>()
                .map(|e| String::from(e.message()))
        })
        .unwrap_or_else(|| format!("{value:?}"))
}

/// serde 값 → JS 값 (JSON 경유)
pub fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, CoreError> {
    let json = serde_json::to_string(value)?;
    JSON::parse(&json).map_err(|e| CoreError::Internal(format!("JSON 변환 실패: {}", describe(&e))))
}

/// JS 값 → serde 값 (JSON 경유)
pub fn from_js<T: serde::de::DeserializeOwned>(value: &JsValue) -> Result<T, CoreError> {
    let json = JSON::stringify(value)
        .map_err(|e| CoreError::Internal(format!("JSON 변환 실패: {}", describe(&e))))?
        .as_string()
        .unwrap_or_else(|| "null".to_string());
    Ok(serde_json::from_str(&json)?)
}

/// 객체 속성 조회 (없으면 undefined)
pub fn get(target: &JsValue, key: &str) -> JsValue {
    Reflect::get(target, &JsValue::from_str(key)).unwrap_or(JsValue::UNDEFINED)
}

/// 전역 함수 조회. 로드되지 않았으면 None
pub fn global_function(name: &str) -> Option<Function> {
    let window = web_sys::window()?;
    get(window.as_ref(), name).dyn_into::<Function>().ok()
}

/// 전역 함수 호출 (`gtag(...)`, `fbq(...)` 등)
pub fn call_global(name: &str, args: &[JsValue]) -> Result<(), CoreError> {
    let function = global_function(name)
        .ok_or_else(|| CoreError::SinkUnavailable(format!("{name} 미로드")))?;
    let array: js_sys::Array = args.iter().collect();
    function
        .apply(&JsValue::NULL, &array)
        .map(|_| ())
        .map_err(|e| CoreError::SinkUnavailable(format!("{name} 호출 실패: {}", describe(&e))))
}
