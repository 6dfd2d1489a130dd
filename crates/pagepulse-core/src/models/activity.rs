//! 페이지 활동 모델.
//!
//! 수동 리스너가 받는 DOM 이벤트 요약. 브라우저 어댑터가 실제 DOM 이벤트에서 채운다.

use serde::{Deserialize, Serialize};

/// 클릭된 요소에서 가장 가까운 링크 정보
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LinkClick {
    /// 링크 href (링크가 아니면 None)
    pub href: Option<String>,
    /// 링크 텍스트 (trim 전)
    pub text: Option<String>,
    /// 링크 요소 id
    pub id: Option<String>,
}

/// 제출된 폼 요약
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FormSubmit {
    pub name: Option<String>,
    pub id: Option<String>,
    /// 파일 입력 포함 여부
    pub has_files: bool,
    /// 폼 요소 수
    pub field_count: u32,
}

/// 전역 `error` 이벤트 요약
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScriptError {
    pub message: String,
    pub filename: Option<String>,
    pub lineno: Option<u32>,
    pub colno: Option<u32>,
    pub stack: Option<String>,
}

/// `unhandledrejection` 이벤트 요약
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnhandledRejection {
    pub reason: Option<String>,
    pub stack: Option<String>,
}

/// 애플리케이션이 발행하는 `cart_updated` 커스텀 이벤트 detail
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CartUpdate {
    pub total: Option<f64>,
    #[serde(default)]
    pub item_count: usize,
    pub currency: Option<String>,
}
