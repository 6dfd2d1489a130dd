//! 지표 분류기.
//!
//! 고정 임계값 표에 따른 순수 함수. 숨은 상태가 없다.

use pagepulse_core::models::metric::{Classification, Level, MetricKind};

/// 지표별 임계값
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// 이 값 이하면 good (경계 포함)
    pub good: f64,
    /// 이 값 이하면 needs-improvement, 초과하면 poor
    pub needs_improvement: f64,
}

/// 지표별 임계값 표 (Google 권장값)
pub const fn thresholds(kind: MetricKind) -> Thresholds {
    match kind {
        MetricKind::Lcp => Thresholds {
            good: 2_500.0,
            needs_improvement: 4_000.0,
        },
        MetricKind::Fid => Thresholds {
            good: 100.0,
            needs_improvement: 300.0,
        },
        MetricKind::Cls => Thresholds {
            good: 0.1,
            needs_improvement: 0.25,
        },
        MetricKind::Fcp => Thresholds {
            good: 1_800.0,
            needs_improvement: 3_000.0,
        },
        MetricKind::Ttfb => Thresholds {
            good: 800.0,
            needs_improvement: 1_800.0,
        },
    }
}

/// 지표 값을 분류한다.
///
/// - `value <= good` → good, 100점
/// - `value <= needs_improvement` → needs-improvement, 100→50 선형
/// - 그 외 → poor, `max(0, 100 - ((value - ni) / ni) * 50)`
///
/// 유한하지 않은 값(NaN, ±inf)은 `None`.
pub fn classify(kind: MetricKind, value: f64) -> Option<Classification> {
    if !value.is_finite() {
        return None;
    }

    let Thresholds {
        good,
        needs_improvement,
    } = thresholds(kind);

    let classification = if value <= good {
        Classification {
            level: Level::Good,
            score: 100.0,
        }
    } else if value <= needs_improvement {
        Classification {
            level: Level::NeedsImprovement,
            score: 100.0 - ((value - good) / (needs_improvement - good)) * 50.0,
        }
    } else {
        Classification {
            level: Level::Poor,
            score: (100.0 - ((value - needs_improvement) / needs_improvement) * 50.0).max(0.0),
        }
    };

    Some(classification)
}

/// 이름("LCP" 등)으로 분류. 알 수 없는 지표는 `None`
pub fn classify_named(name: &str, value: f64) -> Option<Classification> {
    let kind = name.parse::<MetricKind>().ok()?;
    classify(kind, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_or_below_good_scores_full() {
        for kind in MetricKind::ALL {
            let t = thresholds(kind);
            for value in [0.0, t.good / 2.0, t.good] {
                let c = classify(kind, value).unwrap();
                assert_eq!(c.level, Level::Good, "{kind} {value}");
                assert_eq!(c.score, 100.0);
            }
        }
    }

    #[test]
    fn poor_lcp_scenario() {
        let c = classify(MetricKind::Lcp, 5_200.0).unwrap();
        assert_eq!(c.level, Level::Poor);
        assert!((c.score - 85.0).abs() < 1e-9);
    }

    #[test]
    fn good_cls_scenario() {
        let c = classify(MetricKind::Cls, 0.05).unwrap();
        assert_eq!(c.level, Level::Good);
        assert_eq!(c.score, 100.0);
    }

    #[test]
    fn fcp_good_boundary_is_inclusive() {
        let c = classify(MetricKind::Fcp, 1_800.0).unwrap();
        assert_eq!(c.level, Level::Good);
        assert_eq!(c.score, 100.0);
    }

    #[test]
    fn needs_improvement_is_linear_between_thresholds() {
        let c = classify(MetricKind::Fid, 200.0).unwrap();
        assert_eq!(c.level, Level::NeedsImprovement);
        assert!((c.score - 75.0).abs() < 1e-9);

        let at_ni = classify(MetricKind::Fid, 300.0).unwrap();
        assert_eq!(at_ni.level, Level::NeedsImprovement);
        assert!((at_ni.score - 50.0).abs() < 1e-9);
    }

    #[test]
    fn poor_score_is_non_increasing_and_floored() {
        for kind in MetricKind::ALL {
            let ni = thresholds(kind).needs_improvement;
            let mut previous = f64::INFINITY;
            for step in 1..=40 {
                let value = ni + ni * 0.1 * step as f64;
                let c = classify(kind, value).unwrap();
                assert_eq!(c.level, Level::Poor);
                assert!(c.score <= previous);
                assert!((0.0..=100.0).contains(&c.score));
                previous = c.score;
            }
            assert_eq!(previous, 0.0, "{kind} 3배 이상은 0점");
        }
    }

    #[test]
    fn classify_is_pure() {
        let first = classify(MetricKind::Ttfb, 1_234.5);
        let second = classify(MetricKind::Ttfb, 1_234.5);
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_or_non_finite_is_absent() {
        assert!(classify_named("INP", 10.0).is_none());
        assert!(classify(MetricKind::Lcp, f64::NAN).is_none());
        assert!(classify(MetricKind::Cls, f64::INFINITY).is_none());
        assert_eq!(
            classify_named("lcp", 1_000.0).map(|c| c.level),
            Some(Level::Good)
        );
    }
}
