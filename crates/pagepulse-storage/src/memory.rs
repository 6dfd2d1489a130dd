//! 메모리 키-값 저장소.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use pagepulse_core::error::CoreError;
use pagepulse_core::ports::storage::KeyValueStore;

/// 메모리 저장소
///
/// `set_available(false)`로 쿼터 초과/프라이빗 모드처럼 모든 접근이 실패하는 저장소를 흉내낸다.
#[derive(Debug)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
    available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// 처음부터 사용할 수 없는 저장소
    pub fn unavailable() -> Self {
        let store = Self::new();
        store.set_available(false);
        store
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }

    /// 저장소 비우기 (사용자가 사이트 데이터를 지운 상황)
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> Result<(), CoreError> {
        if self.available.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(CoreError::StorageUnavailable("메모리 저장소 비활성".to_string()))
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        self.check()?;
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        self.check()?;
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CoreError> {
        self.check()?;
        self.entries.write().remove(key);
        Ok(())
    }
}
