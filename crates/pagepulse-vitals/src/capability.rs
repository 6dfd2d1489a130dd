//! 구독 능력 집합.
//!
//! vitals 콜백과 Observer 구독 결과를 구독별 태그로 보관한다.

use std::collections::BTreeMap;
use std::fmt;

use pagepulse_core::error::CoreError;
use pagepulse_core::models::metric::MetricKind;
use pagepulse_core::models::performance::EntryType;
use serde::{Serialize, Serializer};

/// 구독 대상
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    /// vitals 콜백
    Vital(MetricKind),
    /// Performance Observer
    Observer(EntryType),
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Vital(kind) => write!(f, "vital:{kind}"),
            Capability::Observer(entry_type) => write!(f, "observer:{entry_type}"),
        }
    }
}

/// 구독 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    /// 브라우저가 지원하지 않음
    Unsupported,
    /// 구독 중 에러
    Failed(String),
}

impl SubscriptionStatus {
    /// 구독 결과를 상태로 변환
    pub fn from_result(result: Result<(), CoreError>) -> Self {
        match result {
            Ok(()) => SubscriptionStatus::Active,
            Err(CoreError::ObserverUnsupported(_)) => SubscriptionStatus::Unsupported,
            Err(e) => SubscriptionStatus::Failed(e.to_string()),
        }
    }
}

/// 구독별 상태 모음
///
/// JSON으로는 `{"vital:LCP": {"status": "active"}, ...}` 형태로 직렬화된다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    entries: BTreeMap<Capability, SubscriptionStatus>,
}

impl Serialize for CapabilitySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(k, v)| (k.to_string(), v)))
    }
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, capability: Capability, status: SubscriptionStatus) {
        self.entries.insert(capability, status);
    }

    pub fn status(&self, capability: Capability) -> Option<&SubscriptionStatus> {
        self.entries.get(&capability)
    }

    pub fn is_active(&self, capability: Capability) -> bool {
        matches!(self.status(capability), Some(SubscriptionStatus::Active))
    }

    /// 활성 구독 수
    pub fn active_count(&self) -> usize {
        self.entries
            .values()
            .filter(|s| **s == SubscriptionStatus::Active)
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Capability, &SubscriptionStatus)> {
        self.entries.iter()
    }
}
