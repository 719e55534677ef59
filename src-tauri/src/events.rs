use serde::Serialize;
use tauri::{AppHandle, Emitter, Runtime};
use tracing::{debug, warn};

pub const CALL_STATUS: &str = "call-status";
pub const CALL_CONNECTED: &str = "call-connected";
pub const LOCAL_SDP_READY: &str = "local-sdp-ready";
pub const REMOTE_TRACK: &str = "remote-track";
pub const VIDEO_SOURCE: &str = "video-source";

pub fn emit<R: Runtime, S: Serialize + Clone>(app: &AppHandle<R>, event: &str, payload: S) {
    match app.emit(event, payload) {
        Ok(_) => debug!("Emitted event: {}", event),
        Err(e) => warn!("Failed to emit event {}: {:?}", event, e),
    }
}
