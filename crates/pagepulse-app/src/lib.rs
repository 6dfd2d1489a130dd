//! # pagepulse-app
//!
//! PAGEPULSE 엔진.
//! [`engine::TelemetryEngine`]이 플랫폼 포트를 주입받아 수집기, 완화 실행기,
//! 전송 큐, 추적기를 연결한다. 브라우저 호스트는 `pagepulse-web`,
//! 헤드리스 호스트는 [`platform::Platform::headless`]를 사용한다.

pub mod engine;
pub mod platform;
#[cfg(not(target_arch = "wasm32"))]
pub mod replay;
pub mod telemetry;

pub use engine::{EngineStats, TelemetryEngine};
pub use platform::Platform;
pub use telemetry::init_tracing;
