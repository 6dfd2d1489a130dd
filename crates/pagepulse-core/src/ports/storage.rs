//! 키-값 저장소 포트.
//!
//! 구현: `pagepulse-storage` (메모리), `pagepulse-web` (localStorage/sessionStorage)

use crate::error::CoreError;

/// 문자열 키-값 저장소
///
/// 사용할 수 없는 저장소는 `CoreError::StorageUnavailable`을 반환한다.
pub trait KeyValueStore: Send + Sync {
    /// 값 조회 (없으면 `Ok(None)`)
    fn get(&self, key: &str) -> Result<Option<String>, CoreError>;

    /// 값 저장
    fn set(&self, key: &str, value: &str) -> Result<(), CoreError>;

    /// 값 삭제
    fn remove(&self, key: &str) -> Result<(), CoreError>;
}
