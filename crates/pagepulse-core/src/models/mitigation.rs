//! DOM 완화 요청 모델.

use serde::{Deserialize, Serialize};

use super::metric::MetricKind;

/// 측정 쪽에서 발행하는 완화 요청 신호
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MitigationRequest {
    /// 불량 판정된 지표
    pub kind: MetricKind,
    /// 측정값
    pub value: f64,
}
