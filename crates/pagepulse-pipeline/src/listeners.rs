//! 수동 리스너.
//!
//! 브라우저 어댑터가 DOM 이벤트를 요약해 넘기면 추적 호출로 바꾼다.
//! 각 핸들러는 발생시킨 이벤트 수를 반환한다.

use std::sync::Arc;

use pagepulse_core::models::activity::{
    CartUpdate, FormSubmit, LinkClick, ScriptError, UnhandledRejection,
};
use pagepulse_core::models::event::Params;
use pagepulse_core::ports::clock::Clock;
use pagepulse_core::ports::page::PageContext;
use parking_lot::Mutex;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::spawn::spawn_flush;
use crate::tracker::EventTracker;

/// 가시성 추적 상태
#[derive(Debug, Clone, Copy)]
struct Visibility {
    visible: bool,
    hidden_since: i64,
}

/// 페이지 활동 → 추적 호출
pub struct PassiveListeners {
    tracker: Arc<EventTracker>,
    page: Arc<dyn PageContext>,
    clock: Arc<dyn Clock>,
    visibility: Mutex<Visibility>,
}

impl PassiveListeners {
    pub fn new(
        tracker: Arc<EventTracker>,
        page: Arc<dyn PageContext>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tracker,
            page,
            clock,
            visibility: Mutex::new(Visibility {
                visible: true,
                hidden_since: 0,
            }),
        }
    }

    /// 링크 클릭 → `outbound_click` / `file_download`
    pub fn on_click(&self, click: &LinkClick) -> usize {
        let Some(href) = click.href.as_deref().filter(|h| !h.is_empty()) else {
            return 0;
        };
        let mut fired = 0;

        if self.is_outbound(href) {
            let mut params = Params::new();
            params.insert("destination_url".into(), json!(href));
            params.insert(
                "link_text".into(),
                json!(click.text.as_deref().map(str::trim)),
            );
            params.insert("link_id".into(), json!(click.id.clone().unwrap_or_default()));
            self.tracker.track_event("outbound_click", params);
            fired += 1;
        }

        let is_download = self
            .tracker
            .config()
            .download_extensions
            .iter()
            .any(|ext| href.contains(ext.as_str()));
        if is_download {
            let file_name = href.rsplit('/').next().unwrap_or(href);
            let file_extension = href.rsplit('.').next().unwrap_or_default();
            let mut params = Params::new();
            params.insert("file_url".into(), json!(href));
            params.insert("file_name".into(), json!(file_name));
            params.insert("file_extension".into(), json!(file_extension));
            self.tracker.track_event("file_download", params);
            fired += 1;
        }
        fired
    }

    /// 페이지 기준으로 해석한 링크 호스트가 현재 호스트와 다른지
    fn is_outbound(&self, href: &str) -> bool {
        let resolved = Url::parse(href).or_else(|_| {
            Url::parse(&self.page.url()).and_then(|base| base.join(href))
        });
        match resolved {
            Ok(url) => match url.host_str() {
                Some(host) => host != self.page.hostname(),
                // mailto:, tel: 등
                None => false,
            },
            Err(e) => {
                debug!(href, error = %e, "링크 해석 실패");
                false
            }
        }
    }

    /// 폼 제출 → 폼 제출 추적 (`name || id || unnamed_form`)
    pub fn on_submit(&self, form: &FormSubmit) -> usize {
        let form_name = [form.name.as_deref(), form.id.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
            .unwrap_or("unnamed_form");

        let mut data = Params::new();
        data.insert("has_files".into(), json!(form.has_files));
        data.insert("field_count".into(), json!(form.field_count));
        self.tracker.track_form_submission(form_name, Some(&data));
        1
    }

    /// 검색 입력 변경 → 사이트 검색 (빈 값 무시)
    pub fn on_search_input(&self, value: &str) -> usize {
        let query = value.trim();
        if query.is_empty() {
            return 0;
        }
        self.tracker.track_search(query, 0, None);
        1
    }

    /// 가시성 변경. 숨김 → 표시 전환 시 숨겨져 있던 시간을 기록
    pub fn on_visibility_change(&self, hidden: bool) -> usize {
        let now = self.clock.now_millis();
        let hidden_duration = {
            let mut state = self.visibility.lock();
            match (hidden, state.visible) {
                (true, true) => {
                    state.visible = false;
                    state.hidden_since = now;
                    None
                }
                (false, false) => {
                    state.visible = true;
                    Some(now - state.hidden_since)
                }
                _ => None,
            }
        };

        let Some(hidden_duration) = hidden_duration else {
            return 0;
        };
        let mut params = Params::new();
        params.insert("action".into(), json!("visible"));
        params.insert("hidden_duration".into(), json!(hidden_duration));
        self.tracker.track_event("visibility_change", params);
        1
    }

    /// 전역 스크립트 에러 → `javascript_error`
    pub fn on_error(&self, error: &ScriptError) -> usize {
        let mut params = Params::new();
        params.insert("error_message".into(), json!(error.message));
        params.insert("error_filename".into(), json!(error.filename));
        params.insert("error_lineno".into(), json!(error.lineno));
        params.insert("error_colno".into(), json!(error.colno));
        params.insert("error_stack".into(), json!(error.stack));
        self.tracker.track_event("javascript_error", params);
        1
    }

    /// 처리되지 않은 Promise 거부 → `unhandled_promise_rejection`
    pub fn on_unhandled_rejection(&self, rejection: &UnhandledRejection) -> usize {
        let mut params = Params::new();
        params.insert("rejection_reason".into(), json!(rejection.reason));
        params.insert("rejection_stack".into(), json!(rejection.stack));
        self.tracker
            .track_event("unhandled_promise_rejection", params);
        1
    }

    /// 장바구니 변경 커스텀 이벤트 → `cart_updated`
    pub fn on_cart_updated(&self, cart: &CartUpdate) -> usize {
        let currency = cart
            .currency
            .clone()
            .unwrap_or_else(|| self.tracker.config().default_currency.clone());
        let mut params = Params::new();
        params.insert("cart_total".into(), json!(cart.total));
        params.insert("cart_items_count".into(), json!(cart.item_count));
        params.insert("cart_currency".into(), json!(currency));
        self.tracker.track_event("cart_updated", params);
        1
    }

    /// 브라우저 `online` → 연결 복구 기록 + 큐 flush 시작
    pub fn on_online(&self) -> bool {
        let queue = self.tracker.queue().clone();
        queue.connectivity().handle_online();
        spawn_flush(queue, false)
    }

    /// `pagehide` → 큐에 남은 이벤트를 beacon으로 전송. 수락된 수 반환
    pub fn on_page_hide(&self) -> usize {
        self.tracker.queue().flush_with_beacon()
    }
}
