//! Performance API 입력 모델.
//!
//! vitals 콜백 페이로드와 Performance Observer 엔트리를 정의.

use serde::{Deserialize, Serialize};
use std::fmt;

/// vitals 콜백 페이로드 (`{name, value}`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalReport {
    pub name: String,
    pub value: f64,
}

impl VitalReport {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// 관찰하는 Performance Observer 엔트리 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryType {
    Longtask,
    LayoutShift,
    Resource,
    LargestContentfulPaint,
}

impl EntryType {
    pub const ALL: [EntryType; 4] = [
        EntryType::Longtask,
        EntryType::LayoutShift,
        EntryType::Resource,
        EntryType::LargestContentfulPaint,
    ];

    /// `PerformanceObserver.observe({ entryTypes })`에 넘기는 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Longtask => "longtask",
            EntryType::LayoutShift => "layout-shift",
            EntryType::Resource => "resource",
            EntryType::LargestContentfulPaint => "largest-contentful-paint",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Performance Observer 엔트리 (필요한 필드만)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceEntry {
    /// 엔트리 이름 (리소스 URL 등)
    pub name: String,
    pub start_time: f64,
    pub duration: f64,
    /// layout-shift 점수
    #[serde(default)]
    pub value: Option<f64>,
    /// 최근 사용자 입력으로 인한 layout-shift 여부
    #[serde(default)]
    pub had_recent_input: bool,
    /// 리소스 전송 크기 (bytes)
    #[serde(default)]
    pub transfer_size: Option<u64>,
    /// LCP 대상 요소 태그 이름
    #[serde(default)]
    pub element: Option<String>,
}
