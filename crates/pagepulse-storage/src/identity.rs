//! 방문자 식별 저장소.
//!
//! 읽기: durable → ephemeral 순서, 둘 다 없거나 실패하면 없음.
//! 쓰기: durable 실패 시 ephemeral로 재시도, 둘 다 실패하면 포기.
//! 어떤 경우에도 에러를 호출자에게 돌려주지 않는다.

use std::sync::Arc;

use parking_lot::Mutex;
use pagepulse_core::models::identity::Identity;
use pagepulse_core::ports::clock::Clock;
use pagepulse_core::ports::page::PageContext;
use pagepulse_core::ports::storage::KeyValueStore;
use tracing::debug;

use crate::ids;

pub const SESSION_ID_KEY: &str = "pagepulse_session_id";
pub const USER_SEGMENT_KEY: &str = "pagepulse_user_segment";
pub const SESSION_START_KEY: &str = "pagepulse_session_start";
pub const USER_ID_KEY: &str = "pagepulse_user_id";

/// 사용자 세그먼트
pub mod segment {
    pub const NEW_VISITOR: &str = "new_visitor";
    pub const ORGANIC_SEARCH: &str = "organic_search";
    pub const SOCIAL: &str = "social";
    pub const MOBILE_USER: &str = "mobile_user";
    pub const RETURNING_VISITOR: &str = "returning_visitor";
}

/// 방문자 식별 저장소
pub struct IdentityStore {
    durable: Arc<dyn KeyValueStore>,
    ephemeral: Arc<dyn KeyValueStore>,
    page: Arc<dyn PageContext>,
    clock: Arc<dyn Clock>,
    /// 저장소를 쓸 수 없을 때만 사용하는 세그먼트 캐시
    segment_fallback: Mutex<Option<String>>,
}

impl IdentityStore {
    pub fn new(
        durable: Arc<dyn KeyValueStore>,
        ephemeral: Arc<dyn KeyValueStore>,
        page: Arc<dyn PageContext>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            durable,
            ephemeral,
            page,
            clock,
            segment_fallback: Mutex::new(None),
        }
    }

    fn read(&self, key: &str) -> Option<String> {
        for store in [&self.durable, &self.ephemeral] {
            match store.get(key) {
                Ok(Some(value)) if !value.is_empty() => return Some(value),
                Ok(_) => {}
                Err(e) => debug!(key, error = %e, "저장소 읽기 실패"),
            }
        }
        None
    }

    fn write(&self, key: &str, value: &str) -> bool {
        match self.durable.set(key, value) {
            Ok(()) => true,
            Err(e) => {
                debug!(key, error = %e, "durable 저장소 쓰기 실패, ephemeral 재시도");
                match self.ephemeral.set(key, value) {
                    Ok(()) => true,
                    Err(e) => {
                        debug!(key, error = %e, "ephemeral 저장소 쓰기 실패");
                        false
                    }
                }
            }
        }
    }

    /// 세션 ID 조회, 없으면 생성해 저장
    ///
    /// 저장소를 전혀 쓸 수 없으면 호출마다 새 ID를 반환한다.
    pub fn get_or_create_session_id(&self) -> String {
        if let Some(existing) = self.read(SESSION_ID_KEY) {
            return existing;
        }
        let id = ids::session_id(self.clock.now_millis());
        if self.write(SESSION_ID_KEY, &id) {
            debug!(session_id = %id, "새 세션 ID 생성");
        }
        id
    }

    /// 사용자 세그먼트 (한 번 계산 후 캐시)
    pub fn get_user_segment(&self) -> String {
        if let Some(cached) = self.read(USER_SEGMENT_KEY) {
            return cached;
        }
        if let Some(cached) = self.segment_fallback.lock().clone() {
            return cached;
        }

        let computed = self.compute_segment().to_string();
        if !self.write(USER_SEGMENT_KEY, &computed) {
            *self.segment_fallback.lock() = Some(computed.clone());
        }
        debug!(segment = %computed, "사용자 세그먼트 계산");
        computed
    }

    fn compute_segment(&self) -> &'static str {
        if self.read(SESSION_START_KEY).is_none() {
            return segment::NEW_VISITOR;
        }
        let referrer = self.page.referrer();
        if referrer.contains("google.com") {
            return segment::ORGANIC_SEARCH;
        }
        if referrer.contains("facebook.com") || referrer.contains("instagram.com") {
            return segment::SOCIAL;
        }
        let user_agent = self.page.user_agent();
        if ["Mobile", "Android", "iPhone"]
            .iter()
            .any(|p| user_agent.contains(p))
        {
            return segment::MOBILE_USER;
        }
        segment::RETURNING_VISITOR
    }

    /// 세션 시작 시각 (없으면 지금으로 기록)
    pub fn session_start_time(&self) -> i64 {
        if let Some(start) = self
            .read(SESSION_START_KEY)
            .and_then(|v| v.parse::<i64>().ok())
        {
            return start;
        }
        let now = self.clock.now_millis();
        self.write(SESSION_START_KEY, &now.to_string());
        now
    }

    /// 로그인 사용자 ID
    pub fn user_id(&self) -> Option<String> {
        self.read(USER_ID_KEY)
    }

    /// 로그인 사용자 ID 설정 (None이면 삭제)
    pub fn set_user_id(&self, user_id: Option<&str>) {
        match user_id {
            Some(id) => {
                self.write(USER_ID_KEY, id);
            }
            None => {
                for store in [&self.durable, &self.ephemeral] {
                    if let Err(e) = store.remove(USER_ID_KEY) {
                        debug!(error = %e, "사용자 ID 삭제 실패");
                    }
                }
            }
        }
    }

    /// 기기 유형 (mobile / tablet / desktop)
    pub fn device_type(&self) -> &'static str {
        let user_agent = self.page.user_agent();
        if ["Mobile", "Android", "iPhone", "iPad"]
            .iter()
            .any(|p| user_agent.contains(p))
        {
            "mobile"
        } else if user_agent.contains("Tablet") {
            "tablet"
        } else {
            "desktop"
        }
    }

    /// 세션 시작 후 경과 시간 (ms)
    pub fn time_on_page(&self) -> i64 {
        self.clock.now_millis() - self.session_start_time()
    }

    /// 식별 정보 스냅샷
    pub fn identity(&self) -> Identity {
        Identity {
            session_id: self.get_or_create_session_id(),
            user_id: self.user_id(),
            user_segment: self.get_user_segment(),
            session_start_time: self.session_start_time(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use pagepulse_core::ports::page::StaticPage;
    use std::sync::atomic::{AtomicI64, Ordering};

    struct StepClock(AtomicI64);

    impl Clock for StepClock {
        fn now_millis(&self) -> i64 {
            self.0.fetch_add(1, Ordering::Relaxed)
        }
    }

    fn page(referrer: &str, user_agent: &str) -> Arc<StaticPage> {
        Arc::new(StaticPage {
            url: "https://shop.example.com/".into(),
            hostname: "shop.example.com".into(),
            referrer: referrer.into(),
            user_agent: user_agent.into(),
            title: "Shop".into(),
        })
    }

    fn store_with(
        durable: Arc<MemoryStore>,
        ephemeral: Arc<MemoryStore>,
        page: Arc<StaticPage>,
    ) -> IdentityStore {
        IdentityStore::new(
            durable,
            ephemeral,
            page,
            Arc::new(StepClock(AtomicI64::new(1_700_000_000_000))),
        )
    }

    #[test]
    fn session_id_is_stable_until_storage_cleared() {
        let durable = Arc::new(MemoryStore::new());
        let store = store_with(durable.clone(), Arc::new(MemoryStore::new()), page("", ""));

        let first = store.get_or_create_session_id();
        assert_eq!(store.get_or_create_session_id(), first);
        assert!(first.starts_with("session_1700000000000_"));

        durable.clear();
        assert_ne!(store.get_or_create_session_id(), first);
    }

    #[test]
    fn falls_back_to_ephemeral_storage() {
        let durable = Arc::new(MemoryStore::unavailable());
        let ephemeral = Arc::new(MemoryStore::new());
        let store = store_with(durable, ephemeral.clone(), page("", ""));

        let id = store.get_or_create_session_id();
        assert_eq!(ephemeral.get(SESSION_ID_KEY).unwrap(), Some(id.clone()));
        assert_eq!(store.get_or_create_session_id(), id);
    }

    #[test]
    fn no_storage_gives_fresh_id_per_call() {
        let store = store_with(
            Arc::new(MemoryStore::unavailable()),
            Arc::new(MemoryStore::unavailable()),
            page("", ""),
        );
        assert_ne!(store.get_or_create_session_id(), store.get_or_create_session_id());
    }

    #[test]
    fn first_visit_is_new_visitor_and_cached() {
        let durable = Arc::new(MemoryStore::new());
        let store = store_with(
            durable.clone(),
            Arc::new(MemoryStore::new()),
            page("https://www.google.com/", ""),
        );

        assert_eq!(store.get_user_segment(), segment::NEW_VISITOR);
        store.session_start_time();
        // 캐시된 값 유지
        assert_eq!(store.get_user_segment(), segment::NEW_VISITOR);
        assert_eq!(
            durable.get(USER_SEGMENT_KEY).unwrap().as_deref(),
            Some(segment::NEW_VISITOR)
        );
    }

    #[test]
    fn returning_visitor_segments() {
        let cases = [
            ("https://www.google.com/search?q=doors", "", segment::ORGANIC_SEARCH),
            ("https://m.facebook.com/", "", segment::SOCIAL),
            ("https://instagram.com/p/1", "", segment::SOCIAL),
            ("", "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0)", segment::MOBILE_USER),
            ("https://bing.com/", "Mozilla/5.0 (X11; Linux x86_64)", segment::RETURNING_VISITOR),
        ];
        for (referrer, user_agent, expected) in cases {
            let durable = Arc::new(MemoryStore::new());
            durable.set(SESSION_START_KEY, "1").unwrap();
            let store = store_with(durable, Arc::new(MemoryStore::new()), page(referrer, user_agent));
            assert_eq!(store.get_user_segment(), expected, "{referrer} / {user_agent}");
        }
    }

    #[test]
    fn segment_cached_in_memory_without_storage() {
        let store = store_with(
            Arc::new(MemoryStore::unavailable()),
            Arc::new(MemoryStore::unavailable()),
            page("", ""),
        );
        assert_eq!(store.get_user_segment(), segment::NEW_VISITOR);
        assert_eq!(
            store.segment_fallback.lock().as_deref(),
            Some(segment::NEW_VISITOR)
        );
    }

    #[test]
    fn user_id_roundtrip_and_identity() {
        let store = store_with(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
            page("", "Mozilla/5.0 (iPad; CPU OS 17_0)"),
        );
        assert_eq!(store.user_id(), None);
        store.set_user_id(Some("u-42"));

        let identity = store.identity();
        assert_eq!(identity.user_id.as_deref(), Some("u-42"));
        assert_eq!(identity.session_start_time, store.session_start_time());
        assert_eq!(store.device_type(), "mobile");

        store.set_user_id(None);
        assert_eq!(store.user_id(), None);
    }
}
