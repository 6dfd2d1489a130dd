//! 방문자 식별 모델.

use serde::{Deserialize, Serialize};

/// 세션 식별 정보: 세션당 1개
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// 세션 ID (생성 후 불변)
    pub session_id: String,
    /// 로그인 사용자 ID
    pub user_id: Option<String>,
    /// 사용자 세그먼트 (한 번 계산 후 캐시)
    pub user_segment: String,
    /// 세션 시작 시각 (epoch ms)
    pub session_start_time: i64,
}
