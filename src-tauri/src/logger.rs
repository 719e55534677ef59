use crate::config::{DEFAULT_LOG_FILTER, LOGGING_ENABLED};
use tracing::debug;
use tracing_subscriber::{fmt::time::ChronoLocal, EnvFilter};
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;

/// Логирование с временными метками; RUST_LOG перекрывает фильтр по умолчанию
pub fn init() {
    if !LOGGING_ENABLED {
        return;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    // повторная инициализация (тесты, второй вызов) просто игнорируется
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string()))
        .with_target(false)
        .try_init();
}

/// Печать ICE-candidate при появлении
pub fn dump_candidate(label: &str, cand: &RTCIceCandidate) {
    if let Ok(init) = cand.to_json() {
        debug!(
            "{label} candidate={} sdp_mid={:?} sdp_mline_index={:?}",
            init.candidate, init.sdp_mid, init.sdp_mline_index
        );
    }
}
