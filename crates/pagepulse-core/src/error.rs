//! PAGEPULSE 핵심 에러 타입.
//!
//! 어댑터 crate는 모두 `CoreError`를 그대로 반환한다.
//! 공개 진입점은 이 에러를 호스트 페이지로 던지지 않고 내부에서 복구한다.

use thiserror::Error;

/// 코어 레이어 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// 필드 유효성 검증 실패
    #[error("유효성 검증 실패: {field}: {message}")]
    Validation {
        /// 검증 실패한 필드명
        field: String,
        /// 실패 사유
        message: String,
    },

    /// 브라우저 저장소 사용 불가 (쿼터 초과, 프라이빗 모드 등)
    #[error("저장소 사용 불가: {0}")]
    StorageUnavailable(String),

    /// Performance Observer / vitals 구독 미지원
    #[error("옵저버 미지원: {0}")]
    ObserverUnsupported(String),

    /// 네트워크 에러 (연결 실패, 타임아웃)
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// Rate Limit 초과 (429)
    #[error("요청 한도 초과, {retry_after_secs}초 후 재시도")]
    RateLimit {
        /// 재시도 대기 시간 (초)
        retry_after_secs: u64,
    },

    /// 서비스 일시 불가 (503)
    #[error("서비스 일시 불가: {0}")]
    ServiceUnavailable(String),

    /// 수집 서버가 이벤트를 거부함 (기타 non-2xx)
    #[error("이벤트 전송 실패 ({status}): {message}")]
    Delivery {
        /// HTTP 상태 코드
        status: u16,
        /// 응답 본문 또는 사유
        message: String,
    },

    /// 외부 싱크(gtag, fbq 등)가 페이지에 없음
    #[error("외부 싱크 없음: {0}")]
    SinkUnavailable(String),

    /// DOM 조작 실패
    #[error("DOM 에러: {0}")]
    Dom(String),

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),
}

impl CoreError {
    /// 전송 실패 계열 에러인지 (재큐잉 대상)
    pub fn is_delivery_failure(&self) -> bool {
        matches!(
            self,
            CoreError::Network(_)
                | CoreError::RateLimit { .. }
                | CoreError::ServiceUnavailable(_)
                | CoreError::Delivery { .. }
        )
    }
}
