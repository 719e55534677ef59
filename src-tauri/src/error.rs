use thiserror::Error;

/// Ошибки обёртки над peer connection
#[derive(Debug, Error)]
pub enum RtcError {
    #[error("PeerConnection not initialized")]
    NotInitialized,

    #[error("webrtc: {0}")]
    Webrtc(#[from] webrtc::Error),
}

/// Ошибки захвата и воспроизведения медиа
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("no audio or video requested")]
    NothingRequested,

    #[error("requested {0} device not found")]
    DeviceNotFound(&'static str),

    #[error("{kind} device cannot be opened: {reason}")]
    DeviceUnavailable { kind: &'static str, reason: String },

    #[error("track {0} has been stopped")]
    TrackStopped(String),

    #[error("cannot write frames to remote track {0}")]
    RemoteTrack(String),

    #[error("playback failed: {0}")]
    Playback(String),

    #[error("webrtc: {0}")]
    Webrtc(String),
}

impl From<webrtc::Error> for MediaError {
    fn from(e: webrtc::Error) -> Self {
        MediaError::Webrtc(e.to_string())
    }
}

#[derive(Debug, Error)]
#[error("clipboard: {0}")]
pub struct ClipboardError(pub String);

#[derive(Debug, Error)]
#[error("fullscreen: {0}")]
pub struct FullscreenError(pub String);

/// Ошибки разбора текста, которым обмениваются пользователи
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("empty session description")]
    Empty,

    #[error("not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("session description exceeds {0} bytes after decompression")]
    TooLarge(usize),

    #[error("compression: {0}")]
    Compression(#[from] std::io::Error),

    #[error("not a session description: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("ICE server {0}: url cannot be empty")]
    EmptyUrl(String),

    #[error("ICE server {0}: TURN servers require username and credential")]
    MissingTurnCredentials(String),

    #[error("ICE server {id}: unknown server type {kind:?}")]
    UnknownType { id: String, kind: String },
}
