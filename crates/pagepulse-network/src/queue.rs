//! 전송 큐.
//!
//! 전송하지 못한 이벤트를 순서대로 보관하고 flush 시 한 번씩 재시도한다.
//! at-least-once: 재시도로 인한 중복은 수집 서버가 처리한다.
//!
//! 재시도 정책:
//! - 이벤트당 최대 시도 횟수 (`max_attempts`) 초과 시 폐기 + error 로그
//! - 큐 최대 길이 (`max_queue_len`) 초과 시 가장 오래된 이벤트 폐기
//! - 실패한 flush 이후 자동 flush(`maybe_flush`)는 exponential backoff 동안 보류
//!   (명시적 `flush`는 보류 무시)

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use pagepulse_core::config::QueueConfig;
use pagepulse_core::models::event::Event;
use pagepulse_core::ports::clock::Clock;
use pagepulse_core::ports::sink::EventSink;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::connectivity::ConnectivityManager;

/// 재시도 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub max_queue_len: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    /// 연속 실패 pass 수에 따른 자동 flush 보류 시간 (ms)
    ///
    /// 1회 → base, 2회 → base*2, ... 최대 max_delay_ms
    pub fn backoff_delay_ms(&self, failed_passes: u32) -> u64 {
        if failed_passes == 0 {
            return 0;
        }
        let exponent = (failed_passes - 1).min(32);
        self.base_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_delay_ms)
    }
}

impl From<&QueueConfig> for RetryPolicy {
    fn from(config: &QueueConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            max_queue_len: config.max_queue_len,
            base_delay_ms: config.retry_base_delay_ms,
            max_delay_ms: config.retry_max_delay_ms,
        }
    }
}

/// 큐에 보관된 이벤트
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedEvent {
    pub event: Event,
    /// 지금까지 실패한 전송 시도 수
    pub attempts: u32,
}

/// flush 1회 결과
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    /// 다른 flush가 진행 중이어서 건너뜀
    pub skipped: bool,
    pub attempted: usize,
    pub delivered: usize,
    pub requeued: usize,
    /// 시도 횟수 초과로 폐기
    pub dropped: usize,
}

/// 큐 통계
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub length: usize,
    pub flushing: bool,
    /// 누적 전송 성공 수
    pub delivered: u64,
    /// 누적 폐기 수 (시도 초과 + 큐 넘침)
    pub dropped: u64,
    /// 연속 실패 flush 수
    pub failed_passes: u32,
    /// 자동 flush 재개 시각 (epoch ms, 0이면 보류 없음)
    pub retry_not_before: i64,
}

struct QueueState {
    events: VecDeque<QueuedEvent>,
    delivered: u64,
    dropped: u64,
    failed_passes: u32,
    retry_not_before: i64,
}

/// flush 진행 중 표시. drop 시 해제
struct FlushGuard<'a>(&'a AtomicBool);

impl<'a> FlushGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// 이벤트 전송 큐
pub struct DeliveryQueue {
    sink: Arc<dyn EventSink>,
    connectivity: Arc<ConnectivityManager>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
    state: Mutex<QueueState>,
    flushing: AtomicBool,
}

impl DeliveryQueue {
    pub fn new(
        sink: Arc<dyn EventSink>,
        connectivity: Arc<ConnectivityManager>,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            sink,
            connectivity,
            clock,
            policy,
            state: Mutex::new(QueueState {
                events: VecDeque::new(),
                delivered: 0,
                dropped: 0,
                failed_passes: 0,
                retry_not_before: 0,
            }),
            flushing: AtomicBool::new(false),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn connectivity(&self) -> &Arc<ConnectivityManager> {
        &self.connectivity
    }

    /// 이벤트를 큐 끝에 추가 (네트워크 I/O 없음)
    pub fn enqueue(&self, event: Event) {
        self.push_back(QueuedEvent { event, attempts: 0 });
    }

    fn push_back(&self, queued: QueuedEvent) {
        let mut state = self.state.lock();
        state.events.push_back(queued);
        self.trim_overflow(&mut state);
        debug!("이벤트 큐 추가, 현재 크기: {}", state.events.len());
    }

    fn trim_overflow(&self, state: &mut QueueState) {
        while state.events.len() > self.policy.max_queue_len {
            if let Some(oldest) = state.events.pop_front() {
                state.dropped += 1;
                warn!(event = %oldest.event.name, "큐 최대 길이 초과 - 가장 오래된 이벤트 폐기");
            }
        }
    }

    /// 이벤트 즉시 전송. 실패하면 시도 1회로 기록해 큐에 넣는다.
    pub async fn deliver_now(&self, event: Event) {
        match self.sink.deliver(&event).await {
            Ok(()) => {
                self.connectivity.record_success();
                self.state.lock().delivered += 1;
            }
            Err(e) => {
                warn!(event = %event.name, error = %e, "이벤트 전송 실패, 큐에 보관");
                self.connectivity.record_failure();
                self.push_back(QueuedEvent { event, attempts: 1 });
            }
        }
    }

    /// 큐를 한 번 비우며 모든 이벤트를 한 번씩 전송 시도
    ///
    /// 전송은 큐 순서대로 시작되고 동시에 진행된다. 실패한 이벤트는
    /// 원래 상대 순서를 유지한 채 큐 앞쪽으로 돌아간다.
    /// 다른 flush가 진행 중이면 아무것도 하지 않는다.
    pub async fn flush(&self) -> FlushReport {
        let Some(_guard) = FlushGuard::acquire(&self.flushing) else {
            debug!("flush 진행 중 - 건너뜀");
            return FlushReport {
                skipped: true,
                ..FlushReport::default()
            };
        };

        let batch: Vec<QueuedEvent> = self.state.lock().events.drain(..).collect();
        if batch.is_empty() {
            return FlushReport::default();
        }

        let attempted = batch.len();
        debug!("큐 flush 시작: {attempted}개 이벤트");
        let results = join_all(batch.iter().map(|q| self.sink.deliver(&q.event))).await;

        let mut survivors = Vec::new();
        let mut delivered = 0usize;
        let mut dropped = 0usize;
        for (mut queued, result) in batch.into_iter().zip(results) {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => {
                    queued.attempts += 1;
                    if queued.attempts >= self.policy.max_attempts {
                        error!(
                            event = %queued.event.name,
                            attempts = queued.attempts,
                            error = %e,
                            "최대 시도 횟수 초과 - 이벤트 폐기"
                        );
                        dropped += 1;
                    } else {
                        debug!(event = %queued.event.name, attempts = queued.attempts, error = %e, "재큐잉");
                        survivors.push(queued);
                    }
                }
            }
        }
        let requeued = survivors.len();
        let failed = requeued + dropped;

        if delivered > 0 {
            self.connectivity.record_success();
        } else if failed > 0 {
            self.connectivity.record_failure();
        }

        let now = self.clock.now_millis();
        let mut state = self.state.lock();
        for queued in survivors.into_iter().rev() {
            state.events.push_front(queued);
        }
        self.trim_overflow(&mut state);
        state.delivered += delivered as u64;
        state.dropped += dropped as u64;

        if failed == 0 {
            state.failed_passes = 0;
            state.retry_not_before = 0;
        } else {
            state.failed_passes = state.failed_passes.saturating_add(1);
            let delay = self.policy.backoff_delay_ms(state.failed_passes);
            state.retry_not_before = now + delay as i64;
            warn!(
                failed,
                delivered,
                retry_in_ms = delay,
                "flush 중 전송 실패"
            );
        }

        info!(attempted, delivered, requeued, dropped, "큐 flush 완료");
        FlushReport {
            skipped: false,
            attempted,
            delivered,
            requeued,
            dropped,
        }
    }

    /// 자동 flush: 큐가 비었거나, 브라우저가 오프라인이거나, backoff 중이면 보류
    pub async fn maybe_flush(&self) -> Option<FlushReport> {
        {
            let state = self.state.lock();
            if state.events.is_empty() {
                return None;
            }
            if self.clock.now_millis() < state.retry_not_before {
                return None;
            }
        }
        if !self.connectivity.browser_online() {
            return None;
        }
        Some(self.flush().await)
    }

    /// 페이지 언로드 중 best-effort 전송 (`sendBeacon`)
    ///
    /// 브라우저가 수락한 이벤트만 큐에서 제거한다. 수락된 수 반환.
    pub fn flush_with_beacon(&self) -> usize {
        let mut state = self.state.lock();
        let pending: Vec<QueuedEvent> = state.events.drain(..).collect();
        let mut sent = 0usize;
        for queued in pending {
            if self.sink.send_beacon(&queued.event) {
                sent += 1;
            } else {
                state.events.push_back(queued);
            }
        }
        state.delivered += sent as u64;
        if sent > 0 {
            info!(sent, remaining = state.events.len(), "언로드 beacon 전송");
        }
        sent
    }

    pub fn len(&self) -> usize {
        self.state.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 대기 중인 이벤트 복사본 (큐 순서)
    pub fn pending(&self) -> Vec<QueuedEvent> {
        self.state.lock().events.iter().cloned().collect()
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.state.lock();
        QueueStats {
            length: state.events.len(),
            flushing: self.flushing.load(Ordering::Acquire),
            delivered: state.delivered,
            dropped: state.dropped,
            failed_passes: state.failed_passes,
            retry_not_before: state.retry_not_before,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pagepulse_core::error::CoreError;
    use pagepulse_core::ports::network::ManualNetworkStatus;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicI64;

    struct FixedClock(AtomicI64);

    impl Clock for FixedClock {
        fn now_millis(&self) -> i64 {
            self.0.load(Ordering::Relaxed)
        }
    }

    /// 이름으로 실패 여부를 정하는 싱크
    #[derive(Default)]
    struct ScriptedSink {
        failing: Mutex<HashSet<String>>,
        attempts: Mutex<Vec<String>>,
        beacon_refused: HashSet<String>,
    }

    impl ScriptedSink {
        fn failing(names: &[&str]) -> Self {
            let sink = Self::default();
            sink.set_failing(names);
            sink
        }

        fn set_failing(&self, names: &[&str]) {
            *self.failing.lock() = names.iter().map(|n| n.to_string()).collect();
        }

        fn attempts(&self) -> Vec<String> {
            self.attempts.lock().clone()
        }
    }

    #[async_trait]
    impl EventSink for ScriptedSink {
        async fn deliver(&self, event: &Event) -> Result<(), CoreError> {
            self.attempts.lock().push(event.name.clone());
            tokio::task::yield_now().await;
            if self.failing.lock().contains(&event.name) {
                Err(CoreError::Network("connection reset".into()))
            } else {
                Ok(())
            }
        }

        fn send_beacon(&self, event: &Event) -> bool {
            !self.beacon_refused.contains(&event.name)
        }
    }

    fn make_event(name: &str) -> Event {
        Event {
            name: name.to_string(),
            params: serde_json::Map::new(),
            timestamp: 0,
            user_id: None,
            session_id: "s".into(),
            user_agent: "ua".into(),
            url: "https://shop.example.com/".into(),
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::from(&QueueConfig::default())
    }

    fn queue_with(
        sink: Arc<ScriptedSink>,
        policy: RetryPolicy,
    ) -> (DeliveryQueue, Arc<FixedClock>, Arc<ManualNetworkStatus>) {
        let clock = Arc::new(FixedClock(AtomicI64::new(1_000)));
        let network = Arc::new(ManualNetworkStatus::new(true));
        let connectivity = Arc::new(ConnectivityManager::new(network.clone(), clock.clone(), 3));
        (
            DeliveryQueue::new(sink, connectivity, clock.clone(), policy),
            clock,
            network,
        )
    }

    fn names(queue: &DeliveryQueue) -> Vec<String> {
        queue.pending().into_iter().map(|q| q.event.name).collect()
    }

    #[tokio::test]
    async fn flush_keeps_failed_events_in_order() {
        let sink = Arc::new(ScriptedSink::failing(&["e2", "e4"]));
        let (queue, _, _) = queue_with(sink.clone(), policy());
        for i in 1..=5 {
            queue.enqueue(make_event(&format!("e{i}")));
        }
        assert_eq!(queue.len(), 5);
        assert!(sink.attempts().is_empty());

        let report = queue.flush().await;
        assert_eq!(report.attempted, 5);
        assert_eq!(report.delivered, 3);
        assert_eq!(report.requeued, 2);
        assert_eq!(sink.attempts(), vec!["e1", "e2", "e3", "e4", "e5"]);
        assert_eq!(names(&queue), vec!["e2", "e4"]);
        assert!(queue.pending().iter().all(|q| q.attempts == 1));
    }

    #[tokio::test]
    async fn survivors_go_ahead_of_new_events() {
        let sink = Arc::new(ScriptedSink::failing(&["old"]));
        let (queue, _, _) = queue_with(sink, policy());
        queue.enqueue(make_event("old"));
        queue.flush().await;
        queue.enqueue(make_event("new"));

        assert_eq!(names(&queue), vec!["old", "new"]);
    }

    #[tokio::test]
    async fn single_failure_never_drops() {
        let sink = Arc::new(ScriptedSink::failing(&["x"]));
        let mut policy = policy();
        policy.max_attempts = 2;
        let (queue, _, _) = queue_with(sink.clone(), policy);

        queue.deliver_now(make_event("x")).await;
        assert_eq!(queue.pending()[0].attempts, 1);
        assert_eq!(queue.connectivity().failure_count(), 1);

        let report = queue.flush().await;
        assert_eq!(report.dropped, 1);
        assert!(queue.is_empty());
        assert_eq!(queue.stats().dropped, 1);
        assert_eq!(sink.attempts().len(), 2);
    }

    #[tokio::test]
    async fn overflow_drops_oldest() {
        let sink = Arc::new(ScriptedSink::default());
        let mut policy = policy();
        policy.max_queue_len = 3;
        let (queue, _, _) = queue_with(sink, policy);

        for i in 1..=5 {
            queue.enqueue(make_event(&format!("e{i}")));
        }
        assert_eq!(names(&queue), vec!["e3", "e4", "e5"]);
        assert_eq!(queue.stats().dropped, 2);
    }

    #[tokio::test]
    async fn concurrent_flush_is_noop() {
        let sink = Arc::new(ScriptedSink::default());
        let (queue, _, _) = queue_with(sink.clone(), policy());
        queue.enqueue(make_event("a"));
        queue.enqueue(make_event("b"));

        let (first, second) = tokio::join!(queue.flush(), queue.flush());
        assert!(!first.skipped);
        assert!(second.skipped);
        assert_eq!(first.delivered, 2);
        assert_eq!(sink.attempts().len(), 2);
        assert!(!queue.stats().flushing);
    }

    #[tokio::test]
    async fn automatic_flush_respects_backoff() {
        let sink = Arc::new(ScriptedSink::failing(&["a"]));
        let (queue, clock, network) = queue_with(sink.clone(), policy());
        queue.enqueue(make_event("a"));

        assert!(queue.maybe_flush().await.is_some());
        assert_eq!(queue.stats().retry_not_before, 2_000);

        // backoff 중
        clock.0.store(1_500, Ordering::Relaxed);
        assert!(queue.maybe_flush().await.is_none());

        // 명시적 flush는 backoff 무시
        let report = queue.flush().await;
        assert_eq!(report.attempted, 1);
        assert_eq!(queue.stats().failed_passes, 2);
        assert_eq!(queue.stats().retry_not_before, 1_500 + 2_000);

        // 브라우저 오프라인이면 보류
        sink.set_failing(&[]);
        clock.0.store(10_000, Ordering::Relaxed);
        network.set_online(false);
        assert!(queue.maybe_flush().await.is_none());

        network.set_online(true);
        let report = queue.maybe_flush().await.unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(queue.stats().failed_passes, 0);
        assert!(queue.maybe_flush().await.is_none());
    }

    #[test]
    fn beacon_keeps_refused_events() {
        let sink = Arc::new(ScriptedSink {
            beacon_refused: ["big"].iter().map(|s| s.to_string()).collect(),
            ..ScriptedSink::default()
        });
        let (queue, _, _) = queue_with(sink, policy());
        queue.enqueue(make_event("a"));
        queue.enqueue(make_event("big"));
        queue.enqueue(make_event("c"));

        assert_eq!(queue.flush_with_beacon(), 2);
        assert_eq!(names(&queue), vec!["big"]);
    }

    #[test]
    fn empty_flush_reports_nothing() {
        let (queue, _, _) = queue_with(Arc::new(ScriptedSink::default()), policy());
        let report = tokio_test::block_on(queue.flush());
        assert_eq!(report, FlushReport::default());
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let policy = policy();
        assert_eq!(policy.backoff_delay_ms(0), 0);
        assert_eq!(policy.backoff_delay_ms(1), 1_000);
        assert_eq!(policy.backoff_delay_ms(3), 4_000);
        assert_eq!(policy.backoff_delay_ms(6), 30_000);
        assert_eq!(policy.backoff_delay_ms(60), 30_000);
    }
}
