//! 사용자 타이밍 (mark / measure).
//!
//! 브라우저 `performance.mark`/`measure`와 같은 의미를 [`Clock`] 위에서 제공한다.
//! 측정 실패(없는 mark)는 에러 대신 0을 돌려준다.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use pagepulse_core::ports::clock::Clock;
use tracing::debug;

/// 이름별 mark 시각 보관
pub struct PerformanceMarks {
    clock: Arc<dyn Clock>,
    marks: Mutex<HashMap<String, i64>>,
}

impl PerformanceMarks {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            marks: Mutex::new(HashMap::new()),
        }
    }

    /// 현재 시각으로 mark 기록. 같은 이름은 덮어쓴다
    pub fn mark(&self, name: &str) {
        let now = self.clock.now_millis();
        self.marks.lock().insert(name.to_string(), now);
        debug!(mark = name, at = now, "mark");
    }

    /// `start` mark부터 `end` mark(생략 시 현재)까지의 ms
    pub fn measure(&self, name: &str, start: &str, end: Option<&str>) -> f64 {
        let marks = self.marks.lock();
        let Some(&started) = marks.get(start) else {
            debug!(measure = name, mark = start, "시작 mark 없음");
            return 0.0;
        };
        let ended = match end {
            Some(end) => match marks.get(end) {
                Some(&ended) => ended,
                None => {
                    debug!(measure = name, mark = end, "종료 mark 없음");
                    return 0.0;
                }
            },
            None => self.clock.now_millis(),
        };
        let duration = (ended - started) as f64;
        debug!(measure = name, duration, "measure");
        duration
    }

    pub fn clear(&self) {
        self.marks.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::tests::FixedClock;
    use std::sync::atomic::{AtomicI64, Ordering};

    fn marks() -> (PerformanceMarks, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock(AtomicI64::new(1_000)));
        (PerformanceMarks::new(clock.clone()), clock)
    }

    #[test]
    fn measure_between_marks_and_to_now() {
        let (marks, clock) = marks();
        marks.mark("checkout-start");
        clock.0.fetch_add(250, Ordering::SeqCst);
        marks.mark("checkout-ready");
        clock.0.fetch_add(100, Ordering::SeqCst);

        assert_eq!(
            marks.measure("checkout", "checkout-start", Some("checkout-ready")),
            250.0
        );
        assert_eq!(marks.measure("checkout", "checkout-start", None), 350.0);
    }

    #[test]
    fn missing_mark_measures_zero() {
        let (marks, _) = marks();
        marks.mark("start");

        assert_eq!(marks.measure("x", "never", None), 0.0);
        assert_eq!(marks.measure("x", "start", Some("never")), 0.0);

        marks.clear();
        assert_eq!(marks.measure("x", "start", None), 0.0);
    }
}
