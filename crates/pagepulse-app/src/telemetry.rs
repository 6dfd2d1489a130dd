//! 로깅 초기화.

use tracing_subscriber::EnvFilter;

/// fmt 구독자 설치. `RUST_LOG`가 있으면 그 값을 우선한다.
///
/// 이미 설치되어 있으면 false.
pub fn init_tracing(level: &str) -> bool {
    let filter = format!("pagepulse={level},pagepulse_core={level},pagepulse_vitals={level},pagepulse_mitigation={level},pagepulse_storage={level},pagepulse_network={level},pagepulse_pipeline={level},pagepulse_app={level}");
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter)),
        )
        .with_target(false)
        .try_init()
        .is_ok()
}
