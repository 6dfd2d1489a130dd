//! # pagepulse-pipeline
//!
//! 이벤트 파이프라인.
//! 모든 추적 호출은 하나의 봉투 생성기를 거쳐 온라인이면 즉시 비동기 전송,
//! 오프라인이면 큐에 보관된다. 호출자는 전송을 기다리지 않는다.
//!
//! - [`tracker`]: `track_event`와 타입별 래퍼, 전환 외부 싱크 팬아웃
//! - [`listeners`]: 클릭/제출/가시성/에러 등 페이지 활동 → 추적 호출
//! - [`marks`]: mark/measure 사용자 타이밍
//! - [`spawn`]: 런타임별 fire-and-forget 실행 (tokio / spawn_local)

pub mod listeners;
pub mod marks;
pub mod spawn;
pub mod tracker;
