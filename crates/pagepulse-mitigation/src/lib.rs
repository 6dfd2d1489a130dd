//! # pagepulse-mitigation
//!
//! 불량 판정된 LCP/FID/CLS에 대한 DOM 완화 실행기.
//! 수집기가 보낸 `MitigationRequest`를 받아 지표별 루틴을 실행한다.
//! 루틴은 호출 시점의 DOM만 검사하며, 일치하는 요소가 없으면 아무것도 바꾸지 않는다.
//!
//! - [`executor`]: `MitigationSink` 구현, 활성/비활성 전환, 지표별 통계
//! - [`routines`]: 지표별 DOM 수정 루틴
//! - [`memory_dom`]: 테스트/리플레이용 메모리 DOM (`DomAccessor` 구현)
//! - [`selector`]: 메모리 DOM이 사용하는 간이 CSS 선택자

pub mod executor;
pub mod memory_dom;
pub mod routines;
pub mod selector;
