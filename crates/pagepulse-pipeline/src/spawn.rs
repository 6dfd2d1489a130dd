//! fire-and-forget 실행.
//!
//! native: 현재 tokio 런타임에 spawn. 런타임이 없으면 실행하지 않고 false.
//! wasm32: `wasm_bindgen_futures::spawn_local`.

use std::sync::Arc;

use pagepulse_core::models::event::Event;
use pagepulse_network::queue::DeliveryQueue;
use tracing::debug;

/// 이벤트 즉시 전송을 백그라운드로 시작. 실행할 수 없으면 큐에 넣는다.
pub fn spawn_delivery(queue: Arc<DeliveryQueue>, event: Event) {
    #[cfg(not(target_arch = "wasm32"))]
    {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { queue.deliver_now(event).await });
            }
            Err(_) => {
                debug!(event = %event.name, "비동기 런타임 없음 - 큐에 보관");
                queue.enqueue(event);
            }
        }
    }

    #[cfg(target_arch = "wasm32")]
    {
        wasm_bindgen_futures::spawn_local(async move { queue.deliver_now(event).await });
    }
}

/// 큐 flush를 백그라운드로 시작. 실행하지 못하면 false
pub fn spawn_flush(queue: Arc<DeliveryQueue>, respect_backoff: bool) -> bool {
    #[cfg(not(target_arch = "wasm32"))]
    {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { run_flush(&queue, respect_backoff).await });
                true
            }
            Err(_) => {
                debug!("비동기 런타임 없음 - flush 생략");
                false
            }
        }
    }

    #[cfg(target_arch = "wasm32")]
    {
        wasm_bindgen_futures::spawn_local(async move { run_flush(&queue, respect_backoff).await });
        true
    }
}

async fn run_flush(queue: &DeliveryQueue, respect_backoff: bool) {
    if respect_backoff {
        queue.maybe_flush().await;
    } else {
        queue.flush().await;
    }
}
