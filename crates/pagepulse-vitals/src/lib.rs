//! # pagepulse-vitals
//!
//! Web Vitals 측정 파이프라인.
//! vitals 콜백과 Performance Observer를 구독해 페이지뷰 스냅샷을 갱신하고,
//! 고정 임계값으로 지표를 분류하며 종합 성능 등급과 권장사항을 계산한다.
//!
//! 불량 판정된 LCP/FID/CLS는 `MitigationSink`로 완화 요청만 보내고
//! DOM을 직접 수정하지 않는다.

pub mod capability;
pub mod classifier;
pub mod collector;
pub mod score;
pub mod scripted;
