//! 브라우저 DOM 어댑터.
//!
//! `web_sys::Element`는 스레드 간 이동이 불가능하므로 thread-local 레지스트리에 두고
//! 완화 루틴에는 불투명 핸들만 넘긴다. 루틴이 끝나면 `release`로 반납된다.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use pagepulse_core::config::PreloadAsset;
use pagepulse_core::error::CoreError;
use pagepulse_core::ports::dom::{DomAccessor, ElementHandle, IdleTask, Rect};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Element, HtmlElement, HtmlImageElement, HtmlLinkElement};

use crate::js::{describe, document, get, window};

thread_local! {
    static ELEMENTS: RefCell<HashMap<u64, Element>> = RefCell::new(HashMap::new());
    static NEXT_ID: Cell<u64> = const { Cell::new(1) };
}

fn register(element: Element) -> ElementHandle {
    let id = NEXT_ID.with(|next| {
        let id = next.get();
        next.set(id + 1);
        id
    });
    ELEMENTS.with(|elements| elements.borrow_mut().insert(id, element));
    ElementHandle(id)
}

fn lookup(handle: ElementHandle) -> Option<Element> {
    ELEMENTS.with(|elements| elements.borrow().get(&handle.0).cloned())
}

fn require(handle: ElementHandle) -> Result<Element, CoreError> {
    lookup(handle).ok_or_else(|| CoreError::Dom(format!("반납된 핸들: {}", handle.0)))
}

fn dom_error(e: JsValue) -> CoreError {
    CoreError::Dom(describe(&e))
}

/// `document` 기반 DOM 접근
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserDom;

impl BrowserDom {
    /// 현재 등록된 핸들 수
    pub fn live_handles() -> usize {
        ELEMENTS.with(|elements| elements.borrow().len())
    }
}

impl DomAccessor for BrowserDom {
    fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>, CoreError> {
        let nodes = document()?.query_selector_all(selector).map_err(dom_error)?;
        let mut handles = Vec::with_capacity(nodes.length() as usize);
        for index in 0..nodes.length() {
            if let Some(element) = nodes.item(index).and_then(|n| n.dyn_into::<Element>().ok()) {
                handles.push(register(element));
            }
        }
        Ok(handles)
    }

    fn attribute(&self, element: ElementHandle, name: &str) -> Option<String> {
        lookup(element)?.get_attribute(name)
    }

    fn set_attribute(&self, element: ElementHandle, name: &str, value: &str) -> Result<(), CoreError> {
        require(element)?
            .set_attribute(name, value)
            .map_err(dom_error)
    }

    fn bounding_rect(&self, element: ElementHandle) -> Option<Rect> {
        let rect = lookup(element)?.get_bounding_client_rect();
        Some(Rect::new(rect.top(), rect.left(), rect.width(), rect.height()))
    }

    fn natural_size(&self, element: ElementHandle) -> Option<(u32, u32)> {
        let image = lookup(element)?.dyn_into::<HtmlImageElement>().ok()?;
        Some((image.natural_width(), image.natural_height()))
    }

    fn style(&self, element: ElementHandle, property: &str) -> Option<String> {
        let html = lookup(element)?.dyn_into::<HtmlElement>().ok()?;
        html.style()
            .get_property_value(property)
            .ok()
            .filter(|value| !value.is_empty())
    }

    fn set_style(&self, element: ElementHandle, property: &str, value: &str) -> Result<(), CoreError> {
        let html = require(element)?
            .dyn_into::<HtmlElement>()
            .map_err(|_| CoreError::Dom("HTML 요소가 아님".into()))?;
        html.style().set_property(property, value).map_err(dom_error)
    }

    fn viewport_height(&self) -> f64 {
        window()
            .ok()
            .and_then(|w| w.inner_height().ok())
            .and_then(|h| h.as_f64())
            .unwrap_or(0.0)
    }

    fn append_preload(&self, asset: &PreloadAsset) -> Result<(), CoreError> {
        let document = document()?;
        let link = document.create_element("link").map_err(dom_error)?;
        link.set_attribute("rel", "preload").map_err(dom_error)?;
        link.set_attribute("href", &asset.href).map_err(dom_error)?;
        link.set_attribute("as", &asset.as_type).map_err(dom_error)?;
        if let Some(mime_type) = &asset.mime_type {
            link.set_attribute("type", mime_type).map_err(dom_error)?;
        }
        if let Some(cross_origin) = &asset.cross_origin {
            link.set_attribute("crossorigin", cross_origin)
                .map_err(dom_error)?;
        }
        let head = document
            .head()
            .ok_or_else(|| CoreError::Dom("head 없음".into()))?;
        head.append_child(&link).map_err(dom_error)?;
        Ok(())
    }

    fn on_load_set_attribute(
        &self,
        element: ElementHandle,
        name: &str,
        value: &str,
    ) -> Result<(), CoreError> {
        let target = require(element)?;
        // 캐시된 스타일시트는 load가 다시 발생하지 않는다
        let already_loaded = target
            .dyn_ref::<HtmlLinkElement>()
            .and_then(|link| link.sheet())
            .is_some();
        if already_loaded {
            return target.set_attribute(name, value).map_err(dom_error);
        }
        let (name, value) = (name.to_string(), value.to_string());
        let listener_target = target.clone();
        let callback = Closure::once_into_js(move || {
            if let Err(e) = listener_target.set_attribute(&name, &value) {
                tracing::debug!(error = %describe(&e), "load 후 속성 설정 실패");
            }
        });
        target
            .add_event_listener_with_callback("load", callback.unchecked_ref())
            .map_err(dom_error)
    }

    fn request_idle(&self, task: IdleTask) -> Result<(), CoreError> {
        let window = window()?;
        let request = get(window.as_ref(), "requestIdleCallback")
            .dyn_into::<js_sys::Function>()
            .map_err(|_| CoreError::ObserverUnsupported("requestIdleCallback".into()))?;
        let callback = Closure::once_into_js(move || task());
        request
            .call1(window.as_ref(), &callback)
            .map(|_| ())
            .map_err(dom_error)
    }

    fn release(&self, elements: &[ElementHandle]) {
        ELEMENTS.with(|registry| {
            let mut registry = registry.borrow_mut();
            for handle in elements {
                registry.remove(&handle.0);
            }
        });
    }
}
