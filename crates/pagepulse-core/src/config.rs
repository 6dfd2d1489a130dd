//! 엔진 설정 구조체.
//!
//! 수집 서버 주소, 큐 재시도 정책, vitals/완화 설정 등 런타임 설정을 정의한다.
//! 호스트 페이지가 JSON 문자열로 전달하며 누락된 섹션은 기본값을 사용한다.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::CoreError;

/// 최상위 엔진 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 수집 서버 설정
    #[serde(default)]
    pub collector: CollectorConfig,
    /// 외부 분석 백엔드 식별자 (해석하지 않고 그대로 전달)
    #[serde(default)]
    pub analytics_backend_id: Option<String>,
    /// 전송 큐 설정
    #[serde(default)]
    pub queue: QueueConfig,
    /// 연결 상태 설정
    #[serde(default)]
    pub connectivity: ConnectivityConfig,
    /// Web Vitals 수집 설정
    #[serde(default)]
    pub vitals: VitalsConfig,
    /// DOM 완화 설정
    #[serde(default)]
    pub mitigation: MitigationConfig,
    /// 이벤트 추적 설정
    #[serde(default)]
    pub tracking: TrackingConfig,
}

// ============================================================
// 수집 서버 설정
// ============================================================

/// 수집 서버 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// 수집 서버 기본 URL. 비어 있으면 페이지 origin 기준 (같은 origin 수집)
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// 이벤트 수집 경로
    #[serde(default = "default_events_path")]
    pub events_path: String,
    /// 요청 타임아웃 (밀리초)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            events_path: default_events_path(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl CollectorConfig {
    /// 수집 엔드포인트 전체 URL
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.events_path.trim_start_matches('/')
        )
    }

    /// 기본 URL이 비어 있으면 페이지 origin으로 채운다
    pub fn resolve_origin(&mut self, origin: &str) {
        if self.base_url.trim().is_empty() {
            self.base_url = origin.to_string();
        }
    }

    /// 요청 타임아웃을 Duration으로 반환
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

// ============================================================
// 큐 / 연결 설정
// ============================================================

/// 전송 큐 설정: 재시도 상한과 백오프
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// 큐 최대 길이 (초과 시 가장 오래된 이벤트 폐기)
    #[serde(default = "default_max_queue_len")]
    pub max_queue_len: usize,
    /// 이벤트당 최대 전송 시도 횟수
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// 자동 flush 백오프 시작 지연 (밀리초)
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// 자동 flush 백오프 최대 지연 (밀리초)
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_queue_len: default_max_queue_len(),
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

/// 연결 상태 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    /// 연속 전송 실패 시 오프라인 전환 임계값
    #[serde(default = "default_offline_threshold")]
    pub offline_threshold: u64,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            offline_threshold: default_offline_threshold(),
        }
    }
}

// ============================================================
// Vitals / 완화 설정
// ============================================================

/// Web Vitals 수집 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VitalsConfig {
    /// 느린 리소스 판정 기준 (밀리초)
    #[serde(default = "default_slow_resource_ms")]
    pub slow_resource_ms: f64,
    /// 페이지 로드 후 vitals 리포트 지연 (밀리초)
    #[serde(default = "default_report_delay_ms")]
    pub report_delay_ms: u64,
    /// 성능 등급 이력 최대 보관 수
    #[serde(default = "default_rating_history_limit")]
    pub rating_history_limit: usize,
}

impl Default for VitalsConfig {
    fn default() -> Self {
        Self {
            slow_resource_ms: default_slow_resource_ms(),
            report_delay_ms: default_report_delay_ms(),
            rating_history_limit: default_rating_history_limit(),
        }
    }
}

/// 프리로드할 핵심 리소스
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreloadAsset {
    /// 리소스 URL
    pub href: String,
    /// `as` 속성 (font, image, style 등)
    #[serde(rename = "as")]
    pub as_type: String,
    /// MIME 타입
    #[serde(default)]
    pub mime_type: Option<String>,
    /// crossorigin 속성
    #[serde(default)]
    pub cross_origin: Option<String>,
}

/// DOM 완화 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MitigationConfig {
    /// 완화 실행 활성화 여부
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// LCP 불량 시 프리로드할 리소스 목록
    #[serde(default = "default_critical_assets")]
    pub critical_assets: Vec<PreloadAsset>,
    /// 동적 콘텐츠 컨테이너 셀렉터
    #[serde(default = "default_dynamic_selector")]
    pub dynamic_selector: String,
    /// 동적 컨테이너 최소 높이
    #[serde(default = "default_dynamic_min_height")]
    pub dynamic_min_height: String,
    /// `position: relative`를 적용할 콘텐츠 컨테이너 셀렉터
    #[serde(default = "default_content_container_selector")]
    pub content_container_selector: String,
    /// 이 문자열을 href에 포함한 스타일시트는 지연하지 않음
    #[serde(default = "default_critical_marker")]
    pub critical_marker: String,
}

impl Default for MitigationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            critical_assets: default_critical_assets(),
            dynamic_selector: default_dynamic_selector(),
            dynamic_min_height: default_dynamic_min_height(),
            content_container_selector: default_content_container_selector(),
            critical_marker: default_critical_marker(),
        }
    }
}

// ============================================================
// 추적 설정
// ============================================================

/// 이벤트 추적 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// 시작 시 page_view 자동 전송
    #[serde(default = "default_true")]
    pub auto_page_view: bool,
    /// 전환 이벤트 기본 통화
    #[serde(default = "default_currency")]
    pub default_currency: String,
    /// 파일 다운로드로 판정할 확장자
    #[serde(default = "default_download_extensions")]
    pub download_extensions: Vec<String>,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            auto_page_view: true,
            default_currency: default_currency(),
            download_extensions: default_download_extensions(),
        }
    }
}

// ============================================================
// AppConfig impl
// ============================================================

impl Default for AppConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl AppConfig {
    /// 기본 설정값 반환
    pub fn default_config() -> Self {
        Self {
            collector: CollectorConfig::default(),
            analytics_backend_id: None,
            queue: QueueConfig::default(),
            connectivity: ConnectivityConfig::default(),
            vitals: VitalsConfig::default(),
            mitigation: MitigationConfig::default(),
            tracking: TrackingConfig::default(),
        }
    }

    /// JSON 문자열에서 설정 로드 후 검증
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let config: AppConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// 설정값 유효성 검증
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.collector.events_path.trim().is_empty() {
            return Err(validation("collector.events_path", "비어 있을 수 없음"));
        }
        if self.queue.max_queue_len == 0 {
            return Err(validation("queue.max_queue_len", "1 이상이어야 함"));
        }
        if self.queue.max_attempts < 2 {
            // 한 번의 실패로 이벤트가 폐기되면 안 된다
            return Err(validation("queue.max_attempts", "2 이상이어야 함"));
        }
        if self.queue.retry_base_delay_ms > self.queue.retry_max_delay_ms {
            return Err(validation(
                "queue.retry_base_delay_ms",
                "retry_max_delay_ms보다 클 수 없음",
            ));
        }
        if self.connectivity.offline_threshold == 0 {
            return Err(validation("connectivity.offline_threshold", "1 이상이어야 함"));
        }
        if !self.vitals.slow_resource_ms.is_finite() || self.vitals.slow_resource_ms < 0.0 {
            return Err(validation("vitals.slow_resource_ms", "0 이상의 유한값이어야 함"));
        }
        Ok(())
    }
}

fn validation(field: &str, message: &str) -> CoreError {
    CoreError::Validation {
        field: field.to_string(),
        message: message.to_string(),
    }
}

// ============================================================
// 기본값 함수
// ============================================================

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    String::new()
}
fn default_events_path() -> String {
    "/api/analytics/events".to_string()
}
fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_max_queue_len() -> usize {
    1_000
}
fn default_max_attempts() -> u32 {
    8
}
fn default_retry_base_delay_ms() -> u64 {
    1_000
}
fn default_retry_max_delay_ms() -> u64 {
    30_000
}
fn default_offline_threshold() -> u64 {
    3
}
fn default_slow_resource_ms() -> f64 {
    1_000.0
}
fn default_report_delay_ms() -> u64 {
    5_000
}
fn default_rating_history_limit() -> usize {
    256
}
fn default_critical_assets() -> Vec<PreloadAsset> {
    vec![
        PreloadAsset {
            href: "/fonts/inter-v12-latin-regular.woff2".to_string(),
            as_type: "font".to_string(),
            mime_type: Some("font/woff2".to_string()),
            cross_origin: Some("anonymous".to_string()),
        },
        PreloadAsset {
            href: "/images/hero.webp".to_string(),
            as_type: "image".to_string(),
            mime_type: Some("image/webp".to_string()),
            cross_origin: None,
        },
    ]
}
fn default_dynamic_selector() -> String {
    "[data-dynamic], [data-lazy]".to_string()
}
fn default_dynamic_min_height() -> String {
    "200px".to_string()
}
fn default_content_container_selector() -> String {
    ".content-container".to_string()
}
fn default_critical_marker() -> String {
    "critical".to_string()
}
fn default_currency() -> String {
    "CAD".to_string()
}
fn default_download_extensions() -> Vec<String> {
    [".pdf", ".doc", ".docx", ".xls", ".xlsx", ".zip", ".jpg", ".png"]
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let config = AppConfig::from_json(
            r#"{"analytics_backend_id":"G-TEST","collector":{"base_url":"https://rum.example.com/"}}"#,
        )
        .unwrap();

        assert_eq!(config.analytics_backend_id.as_deref(), Some("G-TEST"));
        assert_eq!(
            config.collector.endpoint(),
            "https://rum.example.com/api/analytics/events"
        );
        assert_eq!(config.queue.retry_max_delay_ms, 30_000);
        assert_eq!(config.tracking.default_currency, "CAD");
    }

    #[test]
    fn empty_object_is_default() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config.connectivity.offline_threshold, 3);
        assert_eq!(config.mitigation.dynamic_min_height, "200px");
    }

    #[test]
    fn default_collector_is_same_origin() {
        let mut collector = AppConfig::default_config().collector;
        assert!(collector.base_url.is_empty());

        collector.resolve_origin("https://shop.example.com");
        assert_eq!(
            collector.endpoint(),
            "https://shop.example.com/api/analytics/events"
        );

        // 명시한 URL은 유지
        collector.resolve_origin("https://other.example.com");
        assert_eq!(collector.base_url, "https://shop.example.com");
    }

    #[test]
    fn default_critical_assets_are_font_and_hero() {
        let assets = AppConfig::from_json("{}").unwrap().mitigation.critical_assets;
        assert_eq!(assets.len(), 2);
        assert_eq!(assets[0].href, "/fonts/inter-v12-latin-regular.woff2");
        assert_eq!(assets[0].cross_origin.as_deref(), Some("anonymous"));
        assert_eq!(assets[1].as_type, "image");
        assert_eq!(assets[1].cross_origin, None);

        let none = AppConfig::from_json(r#"{"mitigation":{"critical_assets":[]}}"#).unwrap();
        assert!(none.mitigation.critical_assets.is_empty());
    }

    #[test]
    fn single_attempt_policy_is_rejected() {
        let result = AppConfig::from_json(r#"{"queue":{"max_attempts":1}}"#);
        assert!(matches!(result, Err(CoreError::Validation { .. })));
    }

    #[test]
    fn inverted_backoff_is_rejected() {
        let mut config = AppConfig::default_config();
        config.queue.retry_base_delay_ms = 60_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_json_is_serialization_error() {
        let result = AppConfig::from_json("{not json");
        assert!(matches!(result, Err(CoreError::Serialization(_))));
    }

    #[test]
    fn preload_asset_uses_as_key() {
        let asset: PreloadAsset =
            serde_json::from_str(r#"{"href":"/images/hero.webp","as":"image","mime_type":"image/webp"}"#)
                .unwrap();
        assert_eq!(asset.as_type, "image");
        assert_eq!(asset.cross_origin, None);
    }
}
