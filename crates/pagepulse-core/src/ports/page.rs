//! 페이지 컨텍스트 포트.
//!
//! 이벤트 봉투와 세그먼트 계산에 필요한 `location`/`document`/`navigator` 값.

/// 현재 페이지 정보
pub trait PageContext: Send + Sync {
    /// `location.href`
    fn url(&self) -> String;
    /// `location.hostname`
    fn hostname(&self) -> String;
    /// `document.referrer`
    fn referrer(&self) -> String;
    /// `navigator.userAgent`
    fn user_agent(&self) -> String;
    /// `document.title`
    fn title(&self) -> String;
}

/// 고정 값 페이지 컨텍스트 (헤드리스 호스트/테스트용)
#[derive(Debug, Clone, Default)]
pub struct StaticPage {
    pub url: String,
    pub hostname: String,
    pub referrer: String,
    pub user_agent: String,
    pub title: String,
}

impl PageContext for StaticPage {
    fn url(&self) -> String {
        self.url.clone()
    }
    fn hostname(&self) -> String {
        self.hostname.clone()
    }
    fn referrer(&self) -> String {
        self.referrer.clone()
    }
    fn user_agent(&self) -> String {
        self.user_agent.clone()
    }
    fn title(&self) -> String {
        self.title.clone()
    }
}
