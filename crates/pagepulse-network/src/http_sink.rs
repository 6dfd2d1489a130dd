//! 수집 서버 HTTP 싱크.
//!
//! `EventSink` 포트 구현. 이벤트 봉투 1건을 JSON으로 POST한다.
//! 호출 내부 재시도는 없다. 실패한 이벤트는 `DeliveryQueue`가 재큐잉한다.

use async_trait::async_trait;
use pagepulse_core::config::CollectorConfig;
use pagepulse_core::error::CoreError;
use pagepulse_core::models::event::Event;
use pagepulse_core::ports::sink::EventSink;
use tracing::{debug, warn};

/// 429 응답에 Retry-After가 없을 때 기본 대기 시간 (초)
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// 수집 서버 HTTP 싱크
pub struct HttpEventSink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpEventSink {
    /// 새 HTTP 싱크 생성
    ///
    /// 네이티브에서는 상대 경로를 풀 origin이 없으므로 `base_url`이 필수다.
    /// 브라우저에서는 호출 전에 [`CollectorConfig::resolve_origin`]으로 채운다.
    pub fn new(config: &CollectorConfig) -> Result<Self, CoreError> {
        if cfg!(not(target_arch = "wasm32")) && config.base_url.trim().is_empty() {
            return Err(CoreError::Config(
                "collector.base_url이 비어 있음 (네이티브 전송에는 절대 URL 필요)".into(),
            ));
        }

        let builder = reqwest::Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(config.request_timeout());

        let client = builder
            .build()
            .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 빌드 실패: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint(),
        })
    }

    /// 전송 대상 URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// 응답 상태 코드 확인 및 에러 매핑
    async fn check_response(&self, resp: reqwest::Response) -> Result<(), CoreError> {
        let status = resp.status();

        if status.is_success() {
            return Ok(());
        }

        let status_code = status.as_u16();
        let retry_after = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let text = resp.text().await.unwrap_or_else(|e| {
            warn!("응답 본문 읽기 실패: {e}");
            String::new()
        });

        match status_code {
            429 => Err(CoreError::RateLimit {
                retry_after_secs: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
            }),
            503 => Err(CoreError::ServiceUnavailable(text)),
            _ => Err(CoreError::Delivery {
                status: status_code,
                message: text,
            }),
        }
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl EventSink for HttpEventSink {
    async fn deliver(&self, event: &Event) -> Result<(), CoreError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(event)
            .send()
            .await
            .map_err(|e| CoreError::Network(format!("이벤트 전송 실패: {e}")))?;

        self.check_response(resp).await?;
        debug!(event = %event.name, "이벤트 전송 완료");
        Ok(())
    }
}
