//! 브라우저 환경 포트: 시계, 저장소, 페이지 정보, 네트워크 상태.

use pagepulse_core::error::CoreError;
use pagepulse_core::ports::clock::Clock;
use pagepulse_core::ports::network::NetworkStatus;
use pagepulse_core::ports::page::PageContext;
use pagepulse_core::ports::storage::KeyValueStore;

use crate::js::{describe, document, window};

/// `Date.now()`
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserClock;

impl Clock for BrowserClock {
    fn now_millis(&self) -> i64 {
        js_sys::Date::now() as i64
    }
}

/// Web Storage 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Local,
    Session,
}

/// `localStorage` / `sessionStorage`
///
/// 프라이빗 모드나 정책으로 접근이 막히면 `StorageUnavailable`.
#[derive(Debug, Clone, Copy)]
pub struct BrowserStore {
    kind: StorageKind,
}

impl BrowserStore {
    pub fn local() -> Self {
        Self {
            kind: StorageKind::Local,
        }
    }

    pub fn session() -> Self {
        Self {
            kind: StorageKind::Session,
        }
    }

    fn storage(&self) -> Result<web_sys::Storage, CoreError> {
        let window = window()?;
        let storage = match self.kind {
            StorageKind::Local => window.local_storage(),
            StorageKind::Session => window.session_storage(),
        };
        storage
            .map_err(|e| CoreError::StorageUnavailable(describe(&e)))?
            .ok_or_else(|| CoreError::StorageUnavailable(format!("{:?} storage 없음", self.kind)))
    }
}

impl KeyValueStore for BrowserStore {
    fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        self.storage()?
            .get_item(key)
            .map_err(|e| CoreError::StorageUnavailable(describe(&e)))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        self.storage()?
            .set_item(key, value)
            .map_err(|e| CoreError::StorageUnavailable(describe(&e)))
    }

    fn remove(&self, key: &str) -> Result<(), CoreError> {
        self.storage()?
            .remove_item(key)
            .map_err(|e| CoreError::StorageUnavailable(describe(&e)))
    }
}

/// `location` / `document` / `navigator` 정보
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserPage;

impl PageContext for BrowserPage {
    fn url(&self) -> String {
        window()
            .ok()
            .and_then(|w| w.location().href().ok())
            .unwrap_or_default()
    }

    fn hostname(&self) -> String {
        window()
            .ok()
            .and_then(|w| w.location().hostname().ok())
            .unwrap_or_default()
    }

    fn referrer(&self) -> String {
        document().map(|d| d.referrer()).unwrap_or_default()
    }

    fn user_agent(&self) -> String {
        window()
            .ok()
            .and_then(|w| w.navigator().user_agent().ok())
            .unwrap_or_default()
    }

    fn title(&self) -> String {
        document().map(|d| d.title()).unwrap_or_default()
    }
}

/// 현재 페이지 origin (`location.origin`)
pub fn page_origin() -> Option<String> {
    window().ok().and_then(|w| w.location().origin().ok())
}

/// `navigator.onLine`
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserNetwork;

impl NetworkStatus for BrowserNetwork {
    fn is_online(&self) -> bool {
        window().map(|w| w.navigator().on_line()).unwrap_or(false)
    }
}
