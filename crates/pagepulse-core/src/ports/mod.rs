//! 포트 인터페이스 (trait).
//!
//! 브라우저 전역(`window`/`navigator`/`document`)을 직접 참조하지 않도록
//! 플랫폼 기능을 작은 trait으로 분리한다. 각 어댑터 crate가 구현하며
//! `pagepulse-app`에서 `Arc<dyn T>`로 와이어링한다.
//!
//! 네트워크 전송만 async이며 `async_trait`을 사용한다.
//! wasm32에서는 브라우저 future가 `Send`가 아니므로 `?Send` 변형을 쓴다.

pub mod clock;
pub mod dom;
pub mod mitigation;
pub mod network;
pub mod page;
pub mod performance;
pub mod sink;
pub mod storage;
