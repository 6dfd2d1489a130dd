//! 이벤트 추적기.
//!
//! 모든 추적 호출은 [`EventTracker::envelope`] 하나로 봉투를 만든 뒤
//! 연결 상태에 따라 즉시 전송하거나 큐에 넣는다.
//! 전환은 내부 이벤트와 별개로 등록된 외부 싱크마다 격리되어 전달된다.

use std::sync::Arc;

use pagepulse_core::config::TrackingConfig;
use pagepulse_core::models::event::{
    Conversion, ConversionKind, ConversionRecord, EngagementKind, Event, LeadType, PageViewRecord,
    Params, ProductAction, ProductDetails,
};
use pagepulse_core::models::metric::{MetricKind, PerformanceRating};
use pagepulse_core::ports::clock::Clock;
use pagepulse_core::models::performance::PerformanceEntry;
use pagepulse_core::ports::page::PageContext;
use pagepulse_core::ports::performance::EntryListener;
use pagepulse_core::ports::sink::ThirdPartySink;
use pagepulse_network::connectivity::ConnectivityStats;
use pagepulse_network::queue::{DeliveryQueue, QueueStats};
use pagepulse_storage::identity::IdentityStore;
use pagepulse_storage::ids;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::spawn::spawn_delivery;

/// 파이프라인 통계
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    pub queue: QueueStats,
    pub connectivity: ConnectivityStats,
    /// 세션 시작 후 경과 시간 (ms)
    pub session_duration_ms: i64,
}

/// 이벤트 추적기
pub struct EventTracker {
    config: TrackingConfig,
    identity: Arc<IdentityStore>,
    page: Arc<dyn PageContext>,
    clock: Arc<dyn Clock>,
    queue: Arc<DeliveryQueue>,
    third_party: Vec<Arc<dyn ThirdPartySink>>,
}

impl EventTracker {
    pub fn new(
        config: TrackingConfig,
        identity: Arc<IdentityStore>,
        page: Arc<dyn PageContext>,
        clock: Arc<dyn Clock>,
        queue: Arc<DeliveryQueue>,
        third_party: Vec<Arc<dyn ThirdPartySink>>,
    ) -> Self {
        Self {
            config,
            identity,
            page,
            clock,
            queue,
            third_party,
        }
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<DeliveryQueue> {
        &self.queue
    }

    pub fn identity(&self) -> &Arc<IdentityStore> {
        &self.identity
    }

    /// 이벤트 봉투 생성 (유일한 생성 경로)
    pub fn envelope(&self, name: &str, params: Params) -> Event {
        Event {
            name: name.to_string(),
            params,
            timestamp: self.clock.now_millis(),
            user_id: self.identity.user_id(),
            session_id: self.identity.get_or_create_session_id(),
            user_agent: self.page.user_agent(),
            url: self.page.url(),
        }
    }

    /// 이벤트 추적. 호출자는 전송 결과를 기다리지 않는다.
    ///
    /// 온라인이면 백그라운드 전송(실패 시 큐 보관), 오프라인이면 큐에만 추가.
    pub fn track_event(&self, name: &str, params: Params) {
        let event = self.envelope(name, params);
        if self.queue.connectivity().is_online() {
            spawn_delivery(self.queue.clone(), event);
        } else {
            debug!(event = %event.name, "오프라인 - 이벤트 큐에 보관");
            self.queue.enqueue(event);
        }
    }

    // ============================================================
    // 페이지뷰 / 전환
    // ============================================================

    /// 페이지뷰 추적 (url/title 생략 시 현재 페이지)
    pub fn track_page_view(&self, url: Option<&str>, title: Option<&str>) {
        let page_location = url.map_or_else(|| self.page.url(), str::to_string);
        let page_title = title.map_or_else(|| self.page.title(), str::to_string);
        let session_id = self.identity.get_or_create_session_id();

        let record = PageViewRecord {
            page_location: page_location.clone(),
            page_title: page_title.clone(),
            session_id: session_id.clone(),
            user_segment: self.identity.get_user_segment(),
        };
        for sink in &self.third_party {
            if let Err(e) = sink.page_view(&record) {
                warn!(sink = sink.name(), error = %e, "외부 싱크 페이지뷰 전달 실패");
            }
        }

        let mut params = Params::new();
        params.insert("page_location".into(), json!(page_location));
        params.insert("page_title".into(), json!(page_title));
        params.insert("page_referrer".into(), json!(self.page.referrer()));
        params.insert("user_agent".into(), json!(self.page.user_agent()));
        params.insert("timestamp".into(), json!(self.clock.now_millis()));
        params.insert("session_id".into(), json!(session_id));
        insert_opt(&mut params, "user_id", self.identity.user_id());
        self.track_event("page_view", params);
    }

    /// 전환 추적
    ///
    /// 내부 이벤트 `conversion_<kind>` + 외부 싱크 팬아웃.
    /// 유형이 없는 전환은 무시한다.
    pub fn track_conversion(&self, conversion: Conversion) {
        let Some(kind) = conversion.kind else {
            warn!("유형 없는 전환 무시");
            return;
        };
        let currency = conversion
            .currency
            .clone()
            .unwrap_or_else(|| self.config.default_currency.clone());

        let mut params = Params::new();
        params.insert("event_category".into(), json!("ecommerce"));
        params.insert("event_label".into(), json!(kind.as_str()));
        insert_opt(&mut params, "value", conversion.value);
        params.insert("currency".into(), json!(currency));
        params.insert("items".into(), json!(conversion.items));
        params.insert("user_segment".into(), json!(self.identity.get_user_segment()));
        params.insert("device_type".into(), json!(self.identity.device_type()));
        params.insert("time_on_page".into(), json!(self.identity.time_on_page()));
        for (key, value) in conversion.metadata {
            params.insert(key, value);
        }

        let transaction_id = (kind == ConversionKind::Purchase)
            .then(|| ids::transaction_id(self.clock.now_millis()));

        let record = ConversionRecord {
            kind,
            value: conversion.value,
            currency,
            items: conversion.items,
            transaction_id,
            params: params.clone(),
        };
        self.fan_out(&record);

        self.track_event(&format!("conversion_{}", kind.as_str()), params);
    }

    fn fan_out(&self, record: &ConversionRecord) {
        for sink in &self.third_party {
            match sink.conversion(record) {
                Ok(()) => debug!(sink = sink.name(), kind = %record.kind, "외부 싱크 전환 전달"),
                Err(e) => warn!(sink = sink.name(), error = %e, "외부 싱크 전환 전달 실패"),
            }
        }
    }

    /// 리드 추적 (quote → 견적 요청 전환, 그 외 → 문의 전환)
    pub fn track_lead(&self, source: &str, lead_type: LeadType, value: Option<f64>) {
        self.track_event(
            "lead_generated",
            object(json!({
                "lead_source": source,
                "lead_type": lead_type.as_str(),
                "lead_value": value.unwrap_or(0.0),
                "user_segment": self.identity.get_user_segment(),
                "page_url": self.page.url(),
                "referrer": self.page.referrer(),
            })),
        );

        let kind = match lead_type {
            LeadType::Quote => ConversionKind::QuoteRequest,
            LeadType::Consultation | LeadType::Newsletter => ConversionKind::ContactForm,
        };
        let mut conversion = Conversion::of(kind)
            .with_meta("source", source)
            .with_meta("lead_type", lead_type.as_str());
        conversion.value = value;
        self.track_conversion(conversion);
    }

    /// 전화 클릭 추적 + 전화 전환
    pub fn track_phone_call(&self, phone_number: &str, source: &str) {
        self.track_event(
            "phone_call",
            object(json!({
                "phone_number": phone_number,
                "call_source": source,
                "page_url": self.page.url(),
                "user_segment": self.identity.get_user_segment(),
            })),
        );

        self.track_conversion(
            Conversion::of(ConversionKind::PhoneCall)
                .with_meta("phone_number", phone_number)
                .with_meta("source", source),
        );
    }

    // ============================================================
    // 검색 / 폼 / 상품 / 참여
    // ============================================================

    /// 사이트 검색 추적
    pub fn track_search(&self, query: &str, results_count: usize, filters: Option<Value>) {
        let mut params = object(json!({
            "search_term": query,
            "results_count": results_count,
            "search_category": "products",
        }));
        insert_opt(&mut params, "search_filters", filters);
        self.track_event("site_search", params);
    }

    /// 폼 제출 추적
    ///
    /// `contact`/`quote` 폼은 리드로도 기록한다.
    pub fn track_form_submission(&self, form_name: &str, form_data: Option<&Params>) {
        let keys: Vec<&String> = form_data.map(|data| data.keys().collect()).unwrap_or_default();
        self.track_event(
            "form_submission",
            object(json!({
                "form_name": form_name,
                "form_data_keys": keys,
                "submission_time": self.clock.now_millis(),
            })),
        );

        match form_name {
            "quote" => self.track_lead("website_form", LeadType::Quote, None),
            "contact" => self.track_lead("website_form", LeadType::Consultation, None),
            _ => {}
        }
    }

    /// 상품 상호작용 추적
    pub fn track_product_interaction(
        &self,
        product_id: &str,
        action: ProductAction,
        details: ProductDetails,
    ) {
        let mut params = Params::new();
        params.insert("product_id".into(), json!(product_id));
        params.insert("action".into(), json!(action.as_str()));
        insert_opt(&mut params, "category", details.category);
        insert_opt(&mut params, "price", details.price);
        insert_opt(&mut params, "brand", details.brand);
        insert_opt(&mut params, "variant", details.variant);
        params.insert("quantity".into(), json!(details.quantity.unwrap_or(1)));
        insert_opt(&mut params, "list_name", details.list_name);
        insert_opt(&mut params, "list_position", details.list_position);
        self.track_event("product_interaction", params);
    }

    /// 사용자 참여 추적 (세션 경과 시간 포함)
    pub fn track_engagement(&self, kind: EngagementKind, data: Params) {
        let mut params = Params::new();
        params.insert("engagement_type".into(), json!(kind.as_str()));
        params.extend(data);
        params.insert(
            "session_duration".into(),
            json!(self.identity.time_on_page()),
        );
        self.track_event("user_engagement", params);
    }

    /// 종합 성능 등급을 `web_vitals` 이벤트로 보고
    pub fn report_vitals(&self, rating: &PerformanceRating) {
        let mut params = Params::new();
        params.insert("event_category".into(), json!("Performance"));
        params.insert("event_label".into(), json!("Core Web Vitals"));
        params.insert("value".into(), json!(rating.score.round() as i64));
        params.insert("level".into(), json!(rating.level.as_str()));
        for kind in MetricKind::ALL {
            if let Some(value) = rating.snapshot.value(kind) {
                params.insert(kind.as_str().to_ascii_lowercase(), json!(value));
            }
        }
        params.insert(
            "recommendations".into(),
            json!(rating.recommendations),
        );
        self.track_event("web_vitals", params);
    }

    /// 사용자 정의 성능 지표. 값은 반올림, 단위 생략 시 "ms"
    pub fn report_metric(&self, name: &str, value: f64, unit: Option<&str>) {
        let unit = unit.unwrap_or("ms");
        info!(metric = name, value = %format_args!("{value:.2}"), unit, "성능 지표");
        let params = object(json!({
            "event_category": "Performance",
            "event_label": name,
            "value": value.round() as i64,
            "custom_parameter": unit,
        }));
        self.track_event("performance_metric", params);
    }

    /// 로그인 사용자 ID 설정 (None이면 해제)
    pub fn set_user_id(&self, user_id: Option<&str>) {
        self.identity.set_user_id(user_id);
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            queue: self.queue.stats(),
            connectivity: self.queue.connectivity().stats(),
            session_duration_ms: self.identity.time_on_page(),
        }
    }
}

impl EntryListener for EventTracker {
    fn long_task(&self, entry: &PerformanceEntry) {
        let params = object(json!({
            "duration": entry.duration,
            "start_time": entry.start_time,
            "task_type": entry.name,
        }));
        self.track_event("long_task", params);
    }

    fn largest_contentful_paint(&self, entry: &PerformanceEntry) {
        let params = object(json!({
            "value": entry.start_time,
            "element": entry.element.as_deref().unwrap_or("unknown"),
        }));
        self.track_event("largest_contentful_paint", params);
    }
}

/// `json!` 객체 → Params
fn object(value: Value) -> Params {
    match value {
        Value::Object(map) => map,
        _ => Params::new(),
    }
}

/// 값이 있을 때만 추가
fn insert_opt<T: Serialize>(params: &mut Params, key: &str, value: Option<T>) {
    if let Some(value) = value {
        match serde_json::to_value(value) {
            Ok(value) => {
                params.insert(key.to_string(), value);
            }
            Err(e) => debug!(key, error = %e, "파라미터 직렬화 실패"),
        }
    }
}
