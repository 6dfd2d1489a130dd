//! 점수 집계기.
//!
//! 스냅샷에 수집된 지표만 분류해 평균 점수와 종합 등급을 계산하고,
//! 결과를 크기 제한이 있는 이력에 추가한다.

use std::collections::VecDeque;

use parking_lot::Mutex;
use pagepulse_core::models::metric::{
    Level, MetricKind, MetricScore, MetricsSnapshot, PerformanceRating,
};

use crate::classifier::classify;

/// 종합 등급 good 하한
const GOOD_SCORE: f64 = 80.0;
/// 종합 등급 needs-improvement 하한
const NEEDS_IMPROVEMENT_SCORE: f64 = 50.0;

/// 지표별 개선 권장사항
pub fn recommendations_for(kind: MetricKind) -> &'static [&'static str] {
    match kind {
        MetricKind::Lcp => &[
            "Optimize LCP: Preload hero images and critical CSS",
            "Use Next.js Image component with priority prop for above-fold images",
            "Consider using a CDN for static assets",
        ],
        MetricKind::Fid => &[
            "Optimize FID: Break up long tasks into smaller chunks",
            "Defer non-critical JavaScript",
            "Use React.lazy() for code splitting",
        ],
        MetricKind::Cls => &[
            "Optimize CLS: Ensure all images have width and height attributes",
            "Reserve space for dynamic content and ads",
            "Avoid inserting content above existing content",
        ],
        MetricKind::Fcp => &[
            "Optimize FCP: Minimize server response time",
            "Enable compression and caching",
            "Optimize critical rendering path",
        ],
        MetricKind::Ttfb => &[
            "Optimize TTFB: Improve server response time",
            "Use CDN for faster content delivery",
            "Enable HTTP/2 and server push",
        ],
    }
}

/// 평균 점수 → 종합 등급
pub fn overall_level(score: f64) -> Level {
    if score < NEEDS_IMPROVEMENT_SCORE {
        Level::Poor
    } else if score < GOOD_SCORE {
        Level::NeedsImprovement
    } else {
        Level::Good
    }
}

/// 성능 등급 계산 + 이력 보관
pub struct ScoreAggregator {
    history: Mutex<VecDeque<PerformanceRating>>,
    max_history: usize,
}

impl ScoreAggregator {
    /// 새 집계기 생성 (이력 최대 `max_history`건)
    pub fn new(max_history: usize) -> Self {
        Self {
            history: Mutex::new(VecDeque::new()),
            max_history: max_history.max(1),
        }
    }

    /// 스냅샷으로 성능 등급을 계산하고 이력에 추가
    pub fn rate(&self, snapshot: &MetricsSnapshot) -> PerformanceRating {
        let rating = compute_rating(snapshot);

        let mut history = self.history.lock();
        if history.len() >= self.max_history {
            history.pop_front();
        }
        history.push_back(rating.clone());

        rating
    }

    /// 이력 전체 (오래된 순)
    pub fn history(&self) -> Vec<PerformanceRating> {
        self.history.lock().iter().cloned().collect()
    }

    /// 가장 최근 등급
    pub fn latest(&self) -> Option<PerformanceRating> {
        self.history.lock().back().cloned()
    }

    /// 이력 수
    pub fn history_len(&self) -> usize {
        self.history.lock().len()
    }
}

/// 이력에 남기지 않고 등급만 계산
pub fn compute_rating(snapshot: &MetricsSnapshot) -> PerformanceRating {
    let breakdown: Vec<MetricScore> = snapshot
        .samples()
        .into_iter()
        .filter_map(|sample| {
            classify(sample.kind, sample.value).map(|c| MetricScore {
                metric: sample.kind,
                value: sample.value,
                score: c.score,
                level: c.level,
            })
        })
        .collect();

    // 샘플이 없으면 0점 (나눗셈 없음)
    let score = if breakdown.is_empty() {
        0.0
    } else {
        breakdown.iter().map(|m| m.score).sum::<f64>() / breakdown.len() as f64
    };

    let mut recommendations: Vec<String> = Vec::new();
    for entry in breakdown.iter().filter(|m| m.level != Level::Good) {
        for text in recommendations_for(entry.metric) {
            if !recommendations.iter().any(|r| r == text) {
                recommendations.push((*text).to_string());
            }
        }
    }

    PerformanceRating {
        score,
        level: overall_level(score),
        snapshot: snapshot.clone(),
        breakdown,
        recommendations,
    }
}
