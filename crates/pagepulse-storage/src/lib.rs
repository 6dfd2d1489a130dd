//! # pagepulse-storage
//!
//! 방문자 식별 정보 저장소.
//! 세션 ID, 사용자 ID, 사용자 세그먼트를 durable → ephemeral 저장소 순으로
//! 읽고 쓰며, 둘 다 사용할 수 없으면 조용히 저하된 동작(호출마다 새 ID)으로 전환한다.
//!
//! - [`memory`]: 메모리 `KeyValueStore` (가용성 토글, 초기화)
//! - [`identity`]: `IdentityStore`
//! - [`ids`]: 세션/거래 ID 생성

pub mod identity;
pub mod ids;
pub mod memory;
