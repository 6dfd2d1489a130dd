//! 완화 요청 포트.
//!
//! 측정(Vitals Collector)과 실행(Mitigator)을 분리하는 신호 경로.
//! 구현: `pagepulse-mitigation::MitigationExecutor`

use crate::models::mitigation::MitigationRequest;

/// 완화 요청 수신자
pub trait MitigationSink: Send + Sync {
    fn request(&self, request: MitigationRequest);
}

/// 요청을 무시하는 싱크 (완화 비활성 호스트용)
#[derive(Debug, Default)]
pub struct NoOpMitigation;

impl MitigationSink for NoOpMitigation {
    fn request(&self, _request: MitigationRequest) {}
}
