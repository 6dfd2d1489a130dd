//! 이벤트 전송 포트.
//!
//! 구현: `pagepulse-network::HttpEventSink` (reqwest),
//! `pagepulse-web` (gtag / fbq / lintrk 외부 싱크)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::event::{ConversionRecord, Event, PageViewRecord};

/// 수집 서버 이벤트 싱크
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait EventSink: Send + Sync {
    /// 이벤트 1건 전송. 실패 시 호출자가 재큐잉한다.
    async fn deliver(&self, event: &Event) -> Result<(), CoreError>;

    /// 페이지 언로드 중 best-effort 전송 (`navigator.sendBeacon`).
    ///
    /// 브라우저가 전송을 수락하면 true. 기본 구현은 지원하지 않음.
    fn send_beacon(&self, _event: &Event) -> bool {
        false
    }
}

/// 외부 분석 싱크 (Google Analytics, Meta Pixel, LinkedIn Insight 등)
///
/// 싱크별로 격리되어 호출되며 한 싱크의 실패가 다른 싱크를 막지 않는다.
pub trait ThirdPartySink: Send + Sync {
    /// 로그용 싱크 이름
    fn name(&self) -> &str;

    /// 전환 전달
    fn conversion(&self, record: &ConversionRecord) -> Result<(), CoreError>;

    /// 페이지뷰 전달 (기본: 무시)
    fn page_view(&self, _record: &PageViewRecord) -> Result<(), CoreError> {
        Ok(())
    }
}
