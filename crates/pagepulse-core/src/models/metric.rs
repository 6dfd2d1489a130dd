//! Web Vitals 지표 모델.
//!
//! 지표 종류, 샘플, 페이지뷰 단위 스냅샷, 분류 결과와 성능 등급을 정의.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Web Vital 지표 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetricKind {
    /// Largest Contentful Paint (ms)
    #[serde(rename = "LCP")]
    Lcp,
    /// First Input Delay (ms)
    #[serde(rename = "FID")]
    Fid,
    /// Cumulative Layout Shift (단위 없음)
    #[serde(rename = "CLS")]
    Cls,
    /// First Contentful Paint (ms)
    #[serde(rename = "FCP")]
    Fcp,
    /// Time to First Byte (ms)
    #[serde(rename = "TTFB")]
    Ttfb,
}

impl MetricKind {
    /// 모든 지표 (스냅샷/리포트 순서)
    pub const ALL: [MetricKind; 5] = [
        MetricKind::Lcp,
        MetricKind::Fid,
        MetricKind::Cls,
        MetricKind::Fcp,
        MetricKind::Ttfb,
    ];

    /// 와이어 이름 ("LCP" 등)
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Lcp => "LCP",
            MetricKind::Fid => "FID",
            MetricKind::Cls => "CLS",
            MetricKind::Fcp => "FCP",
            MetricKind::Ttfb => "TTFB",
        }
    }

    /// DOM 완화 대상 지표인지 (LCP/FID/CLS)
    pub fn is_mitigable(&self) -> bool {
        matches!(self, MetricKind::Lcp | MetricKind::Fid | MetricKind::Cls)
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LCP" => Ok(MetricKind::Lcp),
            "FID" => Ok(MetricKind::Fid),
            "CLS" => Ok(MetricKind::Cls),
            "FCP" => Ok(MetricKind::Fcp),
            "TTFB" => Ok(MetricKind::Ttfb),
            other => Err(format!("알 수 없는 지표: {other}")),
        }
    }
}

/// 분류 등급
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Level {
    Good,
    NeedsImprovement,
    Poor,
}

impl Level {
    /// 와이어 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Good => "good",
            Level::NeedsImprovement => "needs-improvement",
            Level::Poor => "poor",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 지표 분류 결과 (저장하지 않는 파생값)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub level: Level,
    /// 0-100 점수
    pub score: f64,
}

/// 단일 지표 샘플
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub kind: MetricKind,
    pub value: f64,
    /// 수집 시각 (epoch ms)
    pub captured_at: i64,
}

/// 페이지뷰 단위 지표 스냅샷: 종류별 최대 1개 샘플 (last-write-wins)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// 스냅샷 생성 시각 (epoch ms)
    pub timestamp: i64,
    /// 페이지 URL
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lcp: Option<MetricSample>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fid: Option<MetricSample>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cls: Option<MetricSample>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fcp: Option<MetricSample>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttfb: Option<MetricSample>,
}

impl MetricsSnapshot {
    /// 새 스냅샷 생성
    pub fn new(timestamp: i64, url: impl Into<String>) -> Self {
        Self {
            timestamp,
            url: url.into(),
            ..Self::default()
        }
    }

    fn slot_mut(&mut self, kind: MetricKind) -> &mut Option<MetricSample> {
        match kind {
            MetricKind::Lcp => &mut self.lcp,
            MetricKind::Fid => &mut self.fid,
            MetricKind::Cls => &mut self.cls,
            MetricKind::Fcp => &mut self.fcp,
            MetricKind::Ttfb => &mut self.ttfb,
        }
    }

    /// 종류별 샘플 조회
    pub fn get(&self, kind: MetricKind) -> Option<&MetricSample> {
        match kind {
            MetricKind::Lcp => self.lcp.as_ref(),
            MetricKind::Fid => self.fid.as_ref(),
            MetricKind::Cls => self.cls.as_ref(),
            MetricKind::Fcp => self.fcp.as_ref(),
            MetricKind::Ttfb => self.ttfb.as_ref(),
        }
    }

    /// 종류별 값 조회
    pub fn value(&self, kind: MetricKind) -> Option<f64> {
        self.get(kind).map(|sample| sample.value)
    }

    /// 샘플 기록 (같은 종류는 덮어씀)
    pub fn record(&mut self, sample: MetricSample) {
        *self.slot_mut(sample.kind) = Some(sample);
    }

    /// 수집된 샘플 목록 (MetricKind::ALL 순서)
    pub fn samples(&self) -> Vec<MetricSample> {
        MetricKind::ALL
            .iter()
            .filter_map(|kind| self.get(*kind).copied())
            .collect()
    }

    /// 수집된 샘플 수
    pub fn sample_count(&self) -> usize {
        MetricKind::ALL
            .iter()
            .filter(|kind| self.get(**kind).is_some())
            .count()
    }
}

/// 지표별 점수 내역
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricScore {
    pub metric: MetricKind,
    pub value: f64,
    pub score: f64,
    pub level: Level,
}

/// 종합 성능 등급
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRating {
    /// 0-100 종합 점수 (수집된 지표 평균)
    pub score: f64,
    pub level: Level,
    /// 계산 당시 스냅샷
    pub snapshot: MetricsSnapshot,
    /// 지표별 점수
    pub breakdown: Vec<MetricScore>,
    /// 개선 권장사항 (중복 제거)
    pub recommendations: Vec<String>,
}
