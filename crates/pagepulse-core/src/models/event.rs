//! 이벤트 모델.
//!
//! 수집 서버로 전송되는 이벤트 봉투와 전환/리드/상품 상호작용 입력 타입을 정의.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 이벤트 파라미터 (임의 JSON 객체)
pub type Params = serde_json::Map<String, serde_json::Value>;

/// 이벤트 봉투: 생성 후 변경하지 않는다
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// 이벤트 이름 (예: "page_view", "conversion_purchase")
    pub name: String,
    /// 이벤트 파라미터
    pub params: Params,
    /// 발생 시각 (epoch ms)
    pub timestamp: i64,
    /// 사용자 ID (로그인 사용자만)
    pub user_id: Option<String>,
    /// 세션 ID
    pub session_id: String,
    /// 브라우저 user agent
    pub user_agent: String,
    /// 발생 페이지 URL
    pub url: String,
}

/// 전환 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionKind {
    QuoteRequest,
    ContactForm,
    PhoneCall,
    ProductView,
    CartAdd,
    Purchase,
}

impl ConversionKind {
    /// 와이어 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionKind::QuoteRequest => "quote_request",
            ConversionKind::ContactForm => "contact_form",
            ConversionKind::PhoneCall => "phone_call",
            ConversionKind::ProductView => "product_view",
            ConversionKind::CartAdd => "cart_add",
            ConversionKind::Purchase => "purchase",
        }
    }
}

impl fmt::Display for ConversionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 전환 항목
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionItem {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
}

/// 전환 입력
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Conversion {
    pub kind: Option<ConversionKind>,
    pub value: Option<f64>,
    /// 통화 (없으면 설정의 기본 통화)
    pub currency: Option<String>,
    pub items: Vec<ConversionItem>,
    /// 이벤트 파라미터에 병합되는 추가 메타데이터
    pub metadata: Params,
}

impl Conversion {
    /// 유형만 지정한 전환 생성
    pub fn of(kind: ConversionKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// 전환 값 지정
    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    /// 메타데이터 항목 추가
    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// 외부 싱크로 전달되는 정규화된 전환 기록
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionRecord {
    pub kind: ConversionKind,
    pub value: Option<f64>,
    pub currency: String,
    pub items: Vec<ConversionItem>,
    /// 구매 전환에만 부여되는 거래 ID
    pub transaction_id: Option<String>,
    /// 내부 이벤트에 실린 파라미터 전체
    pub params: Params,
}

/// 외부 싱크로 전달되는 페이지뷰 기록
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageViewRecord {
    pub page_location: String,
    pub page_title: String,
    pub session_id: String,
    pub user_segment: String,
}

/// 리드 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadType {
    Quote,
    Consultation,
    Newsletter,
}

impl LeadType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadType::Quote => "quote",
            LeadType::Consultation => "consultation",
            LeadType::Newsletter => "newsletter",
        }
    }
}

/// 상품 상호작용 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductAction {
    View,
    Click,
    AddToCart,
    RemoveFromCart,
}

impl ProductAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductAction::View => "view",
            ProductAction::Click => "click",
            ProductAction::AddToCart => "add_to_cart",
            ProductAction::RemoveFromCart => "remove_from_cart",
        }
    }
}

/// 상품 상호작용 부가 정보
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProductDetails {
    pub category: Option<String>,
    pub price: Option<f64>,
    pub brand: Option<String>,
    pub variant: Option<String>,
    /// 수량 (없으면 1)
    pub quantity: Option<u32>,
    pub list_name: Option<String>,
    pub list_position: Option<u32>,
}

/// 사용자 참여 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementKind {
    ScrollDepth,
    TimeOnPage,
    FormInteraction,
    VideoPlay,
}

impl EngagementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementKind::ScrollDepth => "scroll_depth",
            EngagementKind::TimeOnPage => "time_on_page",
            EngagementKind::FormInteraction => "form_interaction",
            EngagementKind::VideoPlay => "video_play",
        }
    }
}
