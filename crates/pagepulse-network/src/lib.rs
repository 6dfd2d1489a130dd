//! # pagepulse-network
//!
//! 이벤트 전송 어댑터.
//! 수집 서버로 이벤트 봉투를 POST하고, 실패한 이벤트를 큐에 보관했다가
//! 재연결 시 flush한다. 재시도는 이벤트당 시도 횟수 상한과
//! 자동 flush 사이의 exponential backoff로 제한된다.
//!
//! - [`http_sink`]: `EventSink` 구현 (reqwest)
//! - [`connectivity`]: 연속 실패 기반 온라인/오프라인 판정
//! - [`queue`]: `DeliveryQueue`, `RetryPolicy`

pub mod connectivity;
pub mod http_sink;
pub mod queue;
