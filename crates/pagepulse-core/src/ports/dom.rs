//! DOM 접근 포트.
//!
//! 완화 루틴이 페이지 DOM을 조회/수정할 때 사용한다.
//! 구현: `pagepulse-mitigation::MemoryDom` (메모리), `pagepulse-web::BrowserDom`
//!
//! 요소는 불투명 핸들로만 다룬다. `query_all`이 돌려준 핸들은
//! 루틴이 끝나면 `release`로 반납한다.

use crate::config::PreloadAsset;
use crate::error::CoreError;

/// 불투명 요소 핸들
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementHandle(pub u64);

/// 요소 경계 상자 (viewport 기준, CSS 픽셀)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(top: f64, left: f64, width: f64, height: f64) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    /// 면적
    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// 유휴 시간에 실행할 작업
pub type IdleTask = Box<dyn FnOnce() + Send>;

/// DOM 접근자
pub trait DomAccessor: Send + Sync {
    /// CSS 선택자로 요소 조회 (문서 순서)
    fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>, CoreError>;

    /// 속성 값 조회
    fn attribute(&self, element: ElementHandle, name: &str) -> Option<String>;

    /// 속성 존재 여부
    fn has_attribute(&self, element: ElementHandle, name: &str) -> bool {
        self.attribute(element, name).is_some()
    }

    /// 속성 설정
    fn set_attribute(&self, element: ElementHandle, name: &str, value: &str)
        -> Result<(), CoreError>;

    /// 경계 상자
    fn bounding_rect(&self, element: ElementHandle) -> Option<Rect>;

    /// 이미지 원본 크기 (width, height). 로드 전이거나 이미지가 아니면 None
    fn natural_size(&self, element: ElementHandle) -> Option<(u32, u32)>;

    /// 인라인 스타일 속성 값 (비어 있으면 None)
    fn style(&self, element: ElementHandle, property: &str) -> Option<String>;

    /// 인라인 스타일 설정
    fn set_style(&self, element: ElementHandle, property: &str, value: &str)
        -> Result<(), CoreError>;

    /// viewport 높이 (`window.innerHeight`)
    fn viewport_height(&self) -> f64;

    /// `<head>`에 `<link rel="preload">` 추가
    fn append_preload(&self, asset: &PreloadAsset) -> Result<(), CoreError>;

    /// 요소 `load` 이벤트 시 속성을 설정하도록 예약
    ///
    /// 이미 로드된 요소(시트가 붙은 `<link>` 등)는 즉시 설정한다.
    fn on_load_set_attribute(
        &self,
        element: ElementHandle,
        name: &str,
        value: &str,
    ) -> Result<(), CoreError>;

    /// 유휴 시간 콜백 예약. 지원하지 않으면 `ObserverUnsupported`
    fn request_idle(&self, task: IdleTask) -> Result<(), CoreError>;

    /// 핸들 반납
    fn release(&self, handles: &[ElementHandle]);
}
