//! DOM 이벤트 → 엔진 연결.
//!
//! 리스너는 페이지 수명 동안 유지되므로 클로저는 `forget`한다.

use std::rc::Rc;

use pagepulse_app::TelemetryEngine;
use pagepulse_core::error::CoreError;
use pagepulse_core::models::activity::{
    CartUpdate, FormSubmit, LinkClick, ScriptError, UnhandledRejection,
};
use tracing::{debug, info};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{
    CustomEvent, Element, ErrorEvent, Event, EventTarget, HtmlAnchorElement, HtmlFormElement,
    HtmlInputElement, PageTransitionEvent, PromiseRejectionEvent,
};

use crate::js::{describe, document, get, window};

const SEARCH_INPUT_SELECTOR: &str =
    r#"input[type="search"], input[name*="search"], input[placeholder*="search"]"#;

/// 이벤트 리스너 등록 (타입이 맞지 않는 이벤트는 무시)
fn listen<E, F>(target: &EventTarget, name: &str, mut handler: F) -> Result<(), CoreError>
where
    E: JsCast + 'static,
    F: FnMut(E) + 'static,
{
    let closure = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
        if let Ok(event) = event.dyn_into::<E>() {
            handler(event);
        }
    });
    target
        .add_event_listener_with_callback(name, closure.as_ref().unchecked_ref())
        .map_err(|e| CoreError::Internal(format!("{name} 리스너 등록 실패: {}", describe(&e))))?;
    closure.forget();
    Ok(())
}

fn target_element(event: &Event) -> Option<Element> {
    event.target()?.dyn_into::<Element>().ok()
}

fn link_click(event: &Event) -> Option<LinkClick> {
    let link = target_element(event)?
        .closest("a")
        .ok()??
        .dyn_into::<HtmlAnchorElement>()
        .ok()?;
    Some(LinkClick {
        href: Some(link.href()).filter(|href| !href.is_empty()),
        text: link.text_content(),
        id: Some(link.id()).filter(|id| !id.is_empty()),
    })
}

fn form_submit(form: &HtmlFormElement) -> FormSubmit {
    FormSubmit {
        name: Some(form.name()).filter(|name| !name.is_empty()),
        id: Some(form.id()).filter(|id| !id.is_empty()),
        has_files: matches!(form.query_selector(r#"input[type="file"]"#), Ok(Some(_))),
        field_count: form.elements().length(),
    }
}

fn script_error(event: &ErrorEvent) -> ScriptError {
    let error = event.error();
    ScriptError {
        message: event.message(),
        filename: Some(event.filename()).filter(|f| !f.is_empty()),
        lineno: Some(event.lineno()),
        colno: Some(event.colno()),
        stack: get(&error, "stack").as_string(),
    }
}

fn rejection(event: &PromiseRejectionEvent) -> UnhandledRejection {
    let reason = event.reason();
    UnhandledRejection {
        reason: reason
            .as_string()
            .or_else(|| get(&reason, "message").as_string())
            .or_else(|| (!reason.is_undefined()).then(|| describe(&reason))),
        stack: get(&reason, "stack").as_string(),
    }
}

fn cart_update(detail: &JsValue) -> CartUpdate {
    let items = get(detail, "items");
    CartUpdate {
        total: get(detail, "total").as_f64(),
        item_count: js_sys::Array::is_array(&items)
            .then(|| js_sys::Array::from(&items).length() as usize)
            .unwrap_or(0),
        currency: get(detail, "currency").as_string(),
    }
}

/// 페이지 활동 리스너 일괄 등록
pub fn install(engine: Rc<TelemetryEngine>) -> Result<(), CoreError> {
    let window = window()?;
    let document = document()?;
    let document_target: &EventTarget = document.as_ref();
    let window_target: &EventTarget = window.as_ref();

    let e = engine.clone();
    listen(document_target, "click", move |event: Event| {
        if let Some(click) = link_click(&event) {
            e.listeners().on_click(&click);
        }
    })?;

    let e = engine.clone();
    listen(document_target, "submit", move |event: Event| {
        if let Some(form) = event.target().and_then(|t| t.dyn_into::<HtmlFormElement>().ok()) {
            e.listeners().on_submit(&form_submit(&form));
        }
    })?;

    let e = engine.clone();
    listen(document_target, "change", move |event: Event| {
        let Some(element) = target_element(&event) else {
            return;
        };
        if !element.matches(SEARCH_INPUT_SELECTOR).unwrap_or(false) {
            return;
        }
        if let Ok(input) = element.dyn_into::<HtmlInputElement>() {
            e.listeners().on_search_input(&input.value());
        }
    })?;

    let e = engine.clone();
    let visibility_document = document.clone();
    listen(document_target, "visibilitychange", move |_: Event| {
        e.listeners()
            .on_visibility_change(visibility_document.hidden());
    })?;

    let e = engine.clone();
    listen(window_target, "error", move |event: ErrorEvent| {
        e.listeners().on_error(&script_error(&event));
    })?;

    let e = engine.clone();
    listen(
        window_target,
        "unhandledrejection",
        move |event: PromiseRejectionEvent| {
            e.listeners().on_unhandled_rejection(&rejection(&event));
        },
    )?;

    let e = engine.clone();
    listen(window_target, "cart_updated", move |event: CustomEvent| {
        e.listeners().on_cart_updated(&cart_update(&event.detail()));
    })?;

    let e = engine.clone();
    listen(window_target, "online", move |_: Event| {
        let flushing = e.handle_online();
        debug!(flushing, "온라인 복귀");
    })?;

    let e = engine.clone();
    listen(window_target, "pagehide", move |event: PageTransitionEvent| {
        let persisted = event.persisted();
        let beaconed = e.handle_page_hide(persisted);
        debug!(beaconed, persisted, "pagehide");
    })?;

    let e = engine;
    listen(window_target, "pageshow", move |event: PageTransitionEvent| {
        if let Some(capabilities) = e.handle_page_show(event.persisted()) {
            debug!(active = capabilities.active_count(), "bfcache 복원");
        }
    })?;

    info!("페이지 리스너 등록 완료");
    Ok(())
}
