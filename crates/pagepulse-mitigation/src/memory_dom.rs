//! 메모리 DOM.
//!
//! 평면 요소 목록으로 된 `DomAccessor` 구현. 요소 순서가 문서 순서다.
//! 실제 브라우저 없이 완화 루틴을 검증하거나 트레이스를 재생할 때 사용한다.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use pagepulse_core::config::PreloadAsset;
use pagepulse_core::error::CoreError;
use pagepulse_core::ports::dom::{DomAccessor, ElementHandle, IdleTask, Rect};
use serde::Serialize;

use crate::selector::Selector;

/// 메모리 DOM 요소 빌더
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryElement {
    tag: String,
    attrs: BTreeMap<String, String>,
    style: BTreeMap<String, String>,
    rect: Option<Rect>,
    natural_size: Option<(u32, u32)>,
    /// `load` 이벤트가 이미 지나간 요소
    loaded: bool,
    on_load: Vec<(String, String)>,
}

impl MemoryElement {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Self::default()
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn style(mut self, property: &str, value: &str) -> Self {
        self.style.insert(property.to_string(), value.to_string());
        self
    }

    pub fn rect(mut self, rect: Rect) -> Self {
        self.rect = Some(rect);
        self
    }

    pub fn natural_size(mut self, width: u32, height: u32) -> Self {
        self.natural_size = Some((width, height));
        self
    }

    /// 이미 로드가 끝난 요소 (캐시된 스타일시트 등)
    pub fn loaded(mut self) -> Self {
        self.loaded = true;
        self
    }
}

/// 비교용 요소 상태 (핸들러/크기 정보 제외)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementState {
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    pub style: BTreeMap<String, String>,
}

struct DomTree {
    elements: Vec<MemoryElement>,
    idle_tasks: Vec<IdleTask>,
    released: usize,
}

/// 메모리 DOM
pub struct MemoryDom {
    tree: Mutex<DomTree>,
    viewport_height: f64,
    idle_supported: bool,
}

impl MemoryDom {
    /// 빈 문서 생성
    pub fn new(viewport_height: f64) -> Self {
        Self {
            tree: Mutex::new(DomTree {
                elements: Vec::new(),
                idle_tasks: Vec::new(),
                released: 0,
            }),
            viewport_height,
            idle_supported: true,
        }
    }

    /// `requestIdleCallback` 미지원 문서
    pub fn without_idle_callback(mut self) -> Self {
        self.idle_supported = false;
        self
    }

    /// 요소 추가 (문서 끝)
    pub fn insert(&self, element: MemoryElement) -> ElementHandle {
        let mut tree = self.tree.lock();
        tree.elements.push(element);
        ElementHandle((tree.elements.len() - 1) as u64)
    }

    pub fn len(&self) -> usize {
        self.tree.lock().elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 전체 요소 상태 (문서 순서)
    pub fn states(&self) -> Vec<ElementState> {
        self.tree
            .lock()
            .elements
            .iter()
            .map(|e| ElementState {
                tag: e.tag.clone(),
                attrs: e.attrs.clone(),
                style: e.style.clone(),
            })
            .collect()
    }

    /// 요소 `load` 이벤트 발생 (예약된 속성 변경 적용)
    pub fn fire_load(&self, element: ElementHandle) {
        let mut tree = self.tree.lock();
        if let Some(node) = tree.elements.get_mut(element.0 as usize) {
            node.loaded = true;
            for (name, value) in std::mem::take(&mut node.on_load) {
                node.attrs.insert(name, value);
            }
        }
    }

    /// 대기 중인 유휴 작업 실행, 실행한 수 반환
    pub fn run_idle(&self) -> usize {
        let tasks = std::mem::take(&mut self.tree.lock().idle_tasks);
        let count = tasks.len();
        for task in tasks {
            task();
        }
        count
    }

    pub fn pending_idle(&self) -> usize {
        self.tree.lock().idle_tasks.len()
    }

    /// `release`로 반납된 핸들 수
    pub fn released_handles(&self) -> usize {
        self.tree.lock().released
    }

    fn with_element<T>(
        &self,
        element: ElementHandle,
        f: impl FnOnce(&mut MemoryElement) -> T,
    ) -> Result<T, CoreError> {
        let mut tree = self.tree.lock();
        tree.elements
            .get_mut(element.0 as usize)
            .map(f)
            .ok_or_else(|| CoreError::Dom(format!("존재하지 않는 요소 핸들: {}", element.0)))
    }
}

impl DomAccessor for MemoryDom {
    fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>, CoreError> {
        let selector = Selector::parse(selector)?;
        let tree = self.tree.lock();
        Ok(tree
            .elements
            .iter()
            .enumerate()
            .filter(|(_, e)| selector.matches(&e.tag, &e.attrs))
            .map(|(i, _)| ElementHandle(i as u64))
            .collect())
    }

    fn attribute(&self, element: ElementHandle, name: &str) -> Option<String> {
        self.with_element(element, |e| e.attrs.get(name).cloned())
            .ok()
            .flatten()
    }

    fn set_attribute(
        &self,
        element: ElementHandle,
        name: &str,
        value: &str,
    ) -> Result<(), CoreError> {
        self.with_element(element, |e| {
            e.attrs.insert(name.to_ascii_lowercase(), value.to_string());
        })
    }

    fn bounding_rect(&self, element: ElementHandle) -> Option<Rect> {
        self.with_element(element, |e| e.rect.unwrap_or_default()).ok()
    }

    fn natural_size(&self, element: ElementHandle) -> Option<(u32, u32)> {
        self.with_element(element, |e| e.natural_size).ok().flatten()
    }

    fn style(&self, element: ElementHandle, property: &str) -> Option<String> {
        self.with_element(element, |e| {
            e.style.get(property).filter(|v| !v.is_empty()).cloned()
        })
        .ok()
        .flatten()
    }

    fn set_style(
        &self,
        element: ElementHandle,
        property: &str,
        value: &str,
    ) -> Result<(), CoreError> {
        self.with_element(element, |e| {
            e.style.insert(property.to_string(), value.to_string());
        })
    }

    fn viewport_height(&self) -> f64 {
        self.viewport_height
    }

    fn append_preload(&self, asset: &PreloadAsset) -> Result<(), CoreError> {
        let mut link = MemoryElement::new("link")
            .attr("rel", "preload")
            .attr("href", &asset.href)
            .attr("as", &asset.as_type);
        if let Some(mime) = &asset.mime_type {
            link = link.attr("type", mime);
        }
        if let Some(cross_origin) = &asset.cross_origin {
            link = link.attr("crossorigin", cross_origin);
        }
        self.insert(link);
        Ok(())
    }

    fn on_load_set_attribute(
        &self,
        element: ElementHandle,
        name: &str,
        value: &str,
    ) -> Result<(), CoreError> {
        self.with_element(element, |e| {
            let name = name.to_ascii_lowercase();
            // load가 다시 오지 않으므로 바로 적용
            if e.loaded {
                e.attrs.insert(name, value.to_string());
            } else {
                e.on_load.push((name, value.to_string()));
            }
        })
    }

    fn request_idle(&self, task: IdleTask) -> Result<(), CoreError> {
        if !self.idle_supported {
            return Err(CoreError::ObserverUnsupported(
                "requestIdleCallback".to_string(),
            ));
        }
        self.tree.lock().idle_tasks.push(task);
        Ok(())
    }

    fn release(&self, handles: &[ElementHandle]) {
        self.tree.lock().released += handles.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_in_document_order() {
        let dom = MemoryDom::new(800.0);
        let a = dom.insert(MemoryElement::new("img").attr("src", "/a.webp"));
        dom.insert(MemoryElement::new("script").attr("src", "/app.js"));
        let b = dom.insert(MemoryElement::new("IMG").attr("src", "/b.webp"));

        assert_eq!(dom.query_all("img").unwrap(), vec![a, b]);
        assert_eq!(dom.attribute(b, "src").as_deref(), Some("/b.webp"));
    }

    #[test]
    fn load_handlers_apply_on_fire() {
        let dom = MemoryDom::new(800.0);
        let link = dom.insert(MemoryElement::new("link").attr("rel", "stylesheet"));
        dom.set_attribute(link, "media", "print").unwrap();
        dom.on_load_set_attribute(link, "media", "all").unwrap();

        assert_eq!(dom.attribute(link, "media").as_deref(), Some("print"));
        dom.fire_load(link);
        assert_eq!(dom.attribute(link, "media").as_deref(), Some("all"));
    }

    #[test]
    fn load_handler_on_loaded_element_applies_now() {
        let dom = MemoryDom::new(800.0);
        let link = dom.insert(
            MemoryElement::new("link")
                .attr("rel", "stylesheet")
                .loaded(),
        );
        dom.set_attribute(link, "media", "print").unwrap();
        dom.on_load_set_attribute(link, "media", "all").unwrap();

        assert_eq!(dom.attribute(link, "media").as_deref(), Some("all"));
    }

    #[test]
    fn unknown_handle_is_dom_error() {
        let dom = MemoryDom::new(800.0);
        assert!(matches!(
            dom.set_style(ElementHandle(9), "position", "relative"),
            Err(CoreError::Dom(_))
        ));
        assert_eq!(dom.bounding_rect(ElementHandle(9)), None);
    }

    #[test]
    fn idle_support_toggle() {
        let dom = MemoryDom::new(800.0).without_idle_callback();
        assert!(matches!(
            dom.request_idle(Box::new(|| {})),
            Err(CoreError::ObserverUnsupported(_))
        ));
        assert_eq!(dom.pending_idle(), 0);
    }
}
