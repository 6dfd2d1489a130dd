//! PAGEPULSE 도메인 모델.
//!
//! 엔진과 수집 서버가 공유하는 핵심 데이터 구조체를 정의한다.
//! 와이어로 나가는 모델은 `serde` Serialize/Deserialize를 구현한다.

pub mod activity;
pub mod event;
pub mod identity;
pub mod metric;
pub mod mitigation;
pub mod performance;
