use crate::error::MediaError;
use crate::media::capture::{CaptureHandle, RawFrame};
use crate::utils::random_id;
use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

impl TrackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackKind::Audio => "audio",
            TrackKind::Video => "video",
        }
    }

    fn codec(&self) -> RTCRtpCodecCapability {
        match self {
            TrackKind::Video => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                clock_rate: 90000,
                ..Default::default()
            },
            TrackKind::Audio => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 2,
                ..Default::default()
            },
        }
    }
}

/// `video: true | false | { width, height, ... }`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum VideoConstraint {
    Enabled(bool),
    Detailed(VideoTrackConstraints),
}

impl Default for VideoConstraint {
    fn default() -> Self {
        VideoConstraint::Enabled(false)
    }
}

impl VideoConstraint {
    pub fn requested(&self) -> bool {
        match self {
            VideoConstraint::Enabled(on) => *on,
            VideoConstraint::Detailed(_) => true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VideoTrackConstraints {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<u32>,
    pub facing_mode: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct MediaConstraints {
    #[serde(default)]
    pub video: VideoConstraint,
    #[serde(default)]
    pub audio: bool,
}

impl MediaConstraints {
    pub fn camera_and_microphone() -> Self {
        Self {
            video: VideoConstraint::Enabled(true),
            audio: true,
        }
    }
}

#[derive(Clone)]
enum TrackSource {
    Local(Arc<TrackLocalStaticSample>),
    Remote(Arc<TrackRemote>),
}

/// Одна дорожка потока: своя (пишем кадры) или полученная от собеседника
#[derive(Clone)]
pub struct MediaTrack {
    id: String,
    kind: TrackKind,
    source: TrackSource,
    stopped: Arc<AtomicBool>,
    // открытое устройство захвата; отпускается в stop()
    device: Arc<Mutex<Option<CaptureHandle>>>,
}

impl std::fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("remote", &self.is_remote())
            .field("stopped", &self.is_stopped())
            .field("device", &self.has_device())
            .finish()
    }
}

impl MediaTrack {
    pub fn local(kind: TrackKind, stream_id: &str) -> Self {
        let id = format!("{}-{}", kind.as_str(), random_id());
        let track = TrackLocalStaticSample::new(kind.codec(), id.clone(), stream_id.to_string());
        Self {
            id,
            kind,
            source: TrackSource::Local(Arc::new(track)),
            stopped: Arc::new(AtomicBool::new(false)),
            device: Arc::new(Mutex::new(None)),
        }
    }

    /// Локальная дорожка, которая держит открытое устройство
    pub fn captured(kind: TrackKind, stream_id: &str, device: CaptureHandle) -> Self {
        let track = Self::local(kind, stream_id);
        *track.device.lock() = Some(device);
        track
    }

    pub fn remote(track: Arc<TrackRemote>) -> Self {
        let kind = match track.kind() {
            RTPCodecType::Audio => TrackKind::Audio,
            _ => TrackKind::Video,
        };
        Self {
            id: track.id(),
            kind,
            source: TrackSource::Remote(track),
            stopped: Arc::new(AtomicBool::new(false)),
            device: Arc::new(Mutex::new(None)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.source, TrackSource::Remote(_))
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn has_device(&self) -> bool {
        self.device.lock().is_some()
    }

    /// Сырые кадры устройства для конвейера кодирования; отдаются один раз
    pub fn take_raw_frames(&self) -> Option<mpsc::Receiver<RawFrame>> {
        self.device.lock().as_mut().and_then(|d| d.take_frames())
    }

    /// Останавливает дорожку и отпускает устройство; клоны видят то же состояние
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            debug!("Track {} stopped", self.id);
        }
        let device = self.device.lock().take();
        if let Some(mut device) = device {
            device.release();
        }
    }

    /// Для добавления в peer connection; у входящих дорожек `None`
    pub fn as_local(&self) -> Option<Arc<dyn TrackLocal + Send + Sync>> {
        match &self.source {
            TrackSource::Local(t) => Some(t.clone() as Arc<dyn TrackLocal + Send + Sync>),
            TrackSource::Remote(_) => None,
        }
    }

    /// Кадр от конвейера захвата (уже закодированный)
    pub async fn write_frame(&self, data: Bytes, duration: Duration) -> Result<(), MediaError> {
        if self.is_stopped() {
            return Err(MediaError::TrackStopped(self.id.clone()));
        }
        match &self.source {
            TrackSource::Local(t) => {
                t.write_sample(&Sample {
                    data,
                    duration,
                    ..Default::default()
                })
                .await?;
                Ok(())
            }
            TrackSource::Remote(_) => Err(MediaError::RemoteTrack(self.id.clone())),
        }
    }
}

#[derive(Clone, Debug)]
pub struct MediaStream {
    id: String,
    tracks: Vec<MediaTrack>,
}

impl MediaStream {
    pub fn new(id: impl Into<String>, tracks: Vec<MediaTrack>) -> Self {
        Self {
            id: id.into(),
            tracks,
        }
    }

    /// Поток из одной входящей дорожки
    pub fn from_remote(track: Arc<TrackRemote>) -> Self {
        let id = track.stream_id();
        Self::new(id, vec![MediaTrack::remote(track)])
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind == TrackKind::Video)
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind == TrackKind::Audio)
    }

    /// Есть хотя бы одна живая дорожка
    pub fn is_active(&self) -> bool {
        self.tracks.iter().any(|t| !t.is_stopped())
    }

    pub fn stop(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

/// Открывает устройства захвата
pub trait MediaDevices {
    /// Нет устройства → `DeviceNotFound`, занято или запрещено → `DeviceUnavailable`
    fn open(
        &self,
        kind: TrackKind,
        constraints: &MediaConstraints,
    ) -> Result<CaptureHandle, MediaError>;
}

/// Камера и микрофон текущей машины
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemDevices;

impl MediaDevices for SystemDevices {
    #[cfg(feature = "capture")]
    fn open(
        &self,
        kind: TrackKind,
        constraints: &MediaConstraints,
    ) -> Result<CaptureHandle, MediaError> {
        match kind {
            TrackKind::Video => crate::media::capture::open_camera(&constraints.video),
            TrackKind::Audio => crate::media::capture::open_microphone(),
        }
    }

    // сборка без захвата устройств не видит
    #[cfg(not(feature = "capture"))]
    fn open(
        &self,
        kind: TrackKind,
        _constraints: &MediaConstraints,
    ) -> Result<CaptureHandle, MediaError> {
        Err(MediaError::DeviceNotFound(kind.as_str()))
    }
}

/// Запрос потока захвата; единственная операция медиа, которая возвращает ошибку
pub fn get_user_media<D: MediaDevices + ?Sized>(
    devices: &D,
    constraints: &MediaConstraints,
) -> Result<MediaStream, MediaError> {
    let result = open_stream(devices, constraints);
    if let Err(e) = &result {
        error!("Cannot get media devices: {e}");
    }
    result
}

fn open_stream<D: MediaDevices + ?Sized>(
    devices: &D,
    constraints: &MediaConstraints,
) -> Result<MediaStream, MediaError> {
    let mut wanted = Vec::new();
    if constraints.video.requested() {
        wanted.push(TrackKind::Video);
    }
    if constraints.audio {
        wanted.push(TrackKind::Audio);
    }
    if wanted.is_empty() {
        return Err(MediaError::NothingRequested);
    }

    // при ошибке уже открытые устройства отпускаются вместе с вектором
    let mut opened = Vec::with_capacity(wanted.len());
    for kind in wanted {
        opened.push((kind, devices.open(kind, constraints)?));
    }

    let stream_id = format!("local-{}", random_id());
    let tracks = opened
        .into_iter()
        .map(|(kind, device)| MediaTrack::captured(kind, &stream_id, device))
        .collect::<Vec<_>>();
    info!("Opened local stream {} with {} tracks", stream_id, tracks.len());
    Ok(MediaStream::new(stream_id, tracks))
}
