//! # pagepulse-core
//!
//! PAGEPULSE 도메인 모델, 포트(trait) 정의, 에러 타입.
//! 모든 크레이트가 공유하는 핵심 타입과 인터페이스를 제공한다.
//!
//! ## 구조
//!
//! - [`models`]: 도메인 데이터 구조체 (serde Serialize/Deserialize)
//! - [`ports`]: 플랫폼 포트 인터페이스 (Clock, Storage, NetworkStatus, DomAccessor 등)
//! - [`error`]: 핵심 에러 타입 (thiserror)
//! - [`config`]: 엔진 설정 구조체

pub mod config;
pub mod error;
pub mod models;
pub mod ports;
