//! 브라우저 이벤트 싱크.
//!
//! - [`BrowserEventSink`]: reqwest(fetch) POST + 언로드 시 `navigator.sendBeacon`
//! - [`GtagSink`] / [`MetaPixelSink`] / [`LinkedInSink`]: 페이지에 로드된 외부 태그 호출

use async_trait::async_trait;
use pagepulse_core::config::CollectorConfig;
use pagepulse_core::error::CoreError;
use pagepulse_core::models::event::{ConversionKind, ConversionRecord, Event, PageViewRecord};
use pagepulse_core::ports::sink::{EventSink, ThirdPartySink};
use pagepulse_network::http_sink::HttpEventSink;
use serde_json::json;
use tracing::debug;
use wasm_bindgen::JsValue;

use crate::js::{call_global, describe, to_js, window};

/// 수집 서버 싱크 (fetch + sendBeacon)
pub struct BrowserEventSink {
    http: HttpEventSink,
}

impl BrowserEventSink {
    pub fn new(config: &CollectorConfig) -> Result<Self, CoreError> {
        Ok(Self {
            http: HttpEventSink::new(config)?,
        })
    }
}

#[async_trait(?Send)]
impl EventSink for BrowserEventSink {
    async fn deliver(&self, event: &Event) -> Result<(), CoreError> {
        self.http.deliver(event).await
    }

    fn send_beacon(&self, event: &Event) -> bool {
        let Ok(body) = serde_json::to_string(event) else {
            return false;
        };
        let Ok(window) = window() else {
            return false;
        };
        match window
            .navigator()
            .send_beacon_with_opt_str(self.http.endpoint(), Some(&body))
        {
            Ok(accepted) => accepted,
            Err(e) => {
                debug!(error = %describe(&e), "sendBeacon 실패");
                false
            }
        }
    }
}

fn js(value: serde_json::Value) -> Result<JsValue, CoreError> {
    to_js(&value)
}

// ============================================================
// Google Analytics (gtag.js)
// ============================================================

/// `gtag()` 싱크. 측정 ID는 설정의 `analytics_backend_id`
pub struct GtagSink {
    measurement_id: Option<String>,
}

impl GtagSink {
    pub fn new(measurement_id: Option<String>) -> Self {
        Self { measurement_id }
    }
}

impl ThirdPartySink for GtagSink {
    fn name(&self) -> &str {
        "gtag"
    }

    fn conversion(&self, record: &ConversionRecord) -> Result<(), CoreError> {
        if record.kind == ConversionKind::Purchase {
            let mut params = json!({
                "transaction_id": record.transaction_id,
                "currency": record.currency,
                "items": record.items,
            });
            if let Some(value) = record.value {
                params["value"] = json!(value);
            }
            call_global("gtag", &["event".into(), "purchase".into(), js(params)?])
        } else {
            call_global(
                "gtag",
                &[
                    "event".into(),
                    record.kind.as_str().into(),
                    to_js(&record.params)?,
                ],
            )
        }
    }

    fn page_view(&self, record: &PageViewRecord) -> Result<(), CoreError> {
        if let Some(measurement_id) = &self.measurement_id {
            call_global(
                "gtag",
                &[
                    "config".into(),
                    measurement_id.as_str().into(),
                    js(json!({
                        "page_location": record.page_location,
                        "page_title": record.page_title,
                        "custom_map": {
                            "custom_parameter_1": "session_id",
                            "custom_parameter_2": "user_segment",
                        },
                    }))?,
                ],
            )?;
        }
        call_global(
            "gtag",
            &[
                "event".into(),
                "page_view".into(),
                js(json!({
                    "page_location": record.page_location,
                    "page_title": record.page_title,
                    "session_id": record.session_id,
                    "custom_parameter_1": record.session_id,
                    "custom_parameter_2": record.user_segment,
                }))?,
            ],
        )
    }
}

// ============================================================
// Meta Pixel (fbq)
// ============================================================

/// `fbq()` 싱크. 구매와 견적 요청만 전달
#[derive(Debug, Default)]
pub struct MetaPixelSink;

impl ThirdPartySink for MetaPixelSink {
    fn name(&self) -> &str {
        "fbq"
    }

    fn conversion(&self, record: &ConversionRecord) -> Result<(), CoreError> {
        match record.kind {
            ConversionKind::Purchase => {
                let content_ids: Vec<&str> = record.items.iter().map(|i| i.id.as_str()).collect();
                call_global(
                    "fbq",
                    &[
                        "track".into(),
                        "Purchase".into(),
                        js(json!({
                            "value": record.value,
                            "currency": record.currency,
                            "content_ids": content_ids,
                            "content_type": "product",
                        }))?,
                    ],
                )
            }
            ConversionKind::QuoteRequest => call_global(
                "fbq",
                &[
                    "track".into(),
                    "Lead".into(),
                    js(json!({
                        "value": record.value.unwrap_or(0.0),
                        "currency": record.currency,
                    }))?,
                ],
            ),
            _ => Ok(()),
        }
    }
}

// ============================================================
// LinkedIn Insight (lintrk)
// ============================================================

/// `lintrk()` 싱크
#[derive(Debug, Default)]
pub struct LinkedInSink;

impl ThirdPartySink for LinkedInSink {
    fn name(&self) -> &str {
        "lintrk"
    }

    fn conversion(&self, record: &ConversionRecord) -> Result<(), CoreError> {
        call_global(
            "lintrk",
            &[
                "track".into(),
                js(json!({ "conversion_id": record.kind.as_str() }))?,
            ],
        )
    }
}
