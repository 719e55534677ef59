use crate::config::default_ice_servers;
use crate::error::RtcError;
use crate::logger::dump_candidate;
use crate::media::MediaStream;
use crate::peer::state::{
    connection_status, gather_status, StatusClass, StatusUpdate, WebRtcState,
    STATUS_ANSWER_READY, STATUS_CREATING_ANSWER, STATUS_CREATING_OFFER, STATUS_OFFER_READY,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::ice_transport::ice_gatherer_state::RTCIceGathererState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::offer_answer_options::RTCOfferOptions;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_remote::TrackRemote;

pub type StatusListener = Arc<dyn Fn(StatusUpdate) + Send + Sync>;

/// Состояние, которое меняют обработчики событий peer connection
#[derive(Default)]
struct Shared {
    state: Mutex<WebRtcState>,
    listener: Mutex<Option<StatusListener>>,
    // держится от изменения до конца уведомления
    notify: Mutex<()>,
    // номер текущего peer connection; наблюдатели старых молчат
    generation: AtomicU64,
}

impl Shared {
    /// Слушатель получает снимки в том же порядке, в каком менялось состояние.
    /// Из слушателя нельзя снова менять статус сессии.
    fn update(&self, connection: Option<RTCPeerConnectionState>, f: impl FnOnce(&mut WebRtcState)) {
        let _order = self.notify.lock();
        let state = {
            let mut s = self.state.lock();
            f(&mut s);
            s.clone()
        };
        let listener = self.listener.lock().clone();
        if let Some(listener) = listener {
            listener(StatusUpdate { state, connection });
        }
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn set_status(&self, text: &str, class: StatusClass) {
        self.update(None, |s| {
            s.status = text.to_string();
            s.status_class = class;
        });
    }
}

/// Один peer connection и один локальный поток за раз
pub struct WebRtcSession {
    api: API,
    ice_servers: Mutex<Vec<RTCIceServer>>,
    pc: Mutex<Option<Arc<RTCPeerConnection>>>,
    local_stream: Mutex<Option<MediaStream>>,
    shared: Arc<Shared>,
}

impl WebRtcSession {
    pub fn new() -> Result<Self, RtcError> {
        Self::with_ice_servers(default_ice_servers())
    }

    pub fn with_ice_servers(ice_servers: Vec<RTCIceServer>) -> Result<Self, RtcError> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;
        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        Ok(Self {
            api,
            ice_servers: Mutex::new(ice_servers),
            pc: Mutex::new(None),
            local_stream: Mutex::new(None),
            shared: Arc::new(Shared::default()),
        })
    }

    /// Применяется к следующему `create_peer_connection`
    pub fn set_ice_servers(&self, servers: Vec<RTCIceServer>) {
        *self.ice_servers.lock() = servers;
    }

    pub fn ice_servers(&self) -> Vec<RTCIceServer> {
        self.ice_servers.lock().clone()
    }

    pub fn peer_connection(&self) -> Option<Arc<RTCPeerConnection>> {
        self.pc.lock().clone()
    }

    pub fn local_stream(&self) -> Option<MediaStream> {
        self.local_stream.lock().clone()
    }

    pub fn state(&self) -> WebRtcState {
        self.shared.state.lock().clone()
    }

    pub fn on_status_change(&self, listener: StatusListener) {
        *self.shared.listener.lock() = Some(listener);
    }

    pub fn set_status(&self, text: &str, class: StatusClass) {
        self.shared.set_status(text, class);
    }

    pub fn set_gather_status(&self, text: &str, class: StatusClass) {
        self.shared.update(None, |s| {
            s.gather_status = text.to_string();
            s.gather_class = class;
        });
    }

    /// Строки статуса к начальным значениям
    pub fn reset_state(&self) {
        self.shared.update(None, |s| *s = WebRtcState::default());
    }

    /// Закрывает прежнее соединение и создаёт новое с наблюдателями состояния
    pub async fn create_peer_connection(&self) -> Result<Arc<RTCPeerConnection>, RtcError> {
        // закрытие старого соединения не должно попасть в статус
        let generation = self.shared.next_generation();
        let previous = self.pc.lock().take();
        if let Some(old) = previous {
            info!("Closing previous peer connection");
            if let Err(e) = old.close().await {
                warn!("Failed to close previous peer connection: {e}");
            }
        }

        let config = RTCConfiguration {
            ice_servers: self.ice_servers(),
            ..Default::default()
        };
        let pc = Arc::new(self.api.new_peer_connection(config).await?);

        let shared = self.shared.clone();
        pc.on_ice_gathering_state_change(Box::new(move |st: RTCIceGathererState| {
            debug!("ICE gathering state changed to: {}", st);
            if shared.is_current(generation) {
                shared.update(None, |s| {
                    s.gather_status = gather_status(st);
                    s.gather_class = StatusClass::None;
                });
            }
            Box::pin(async {})
        }));

        let shared = self.shared.clone();
        pc.on_peer_connection_state_change(Box::new(move |st: RTCPeerConnectionState| {
            info!("Peer connection state changed to: {}", st);
            if shared.is_current(generation) {
                let (text, class) = connection_status(st);
                shared.update(Some(st), |s| {
                    s.status = text;
                    s.status_class = class;
                });
            } else {
                debug!("Ignoring state of a replaced peer connection");
            }
            Box::pin(async {})
        }));

        *self.pc.lock() = Some(pc.clone());
        info!("Peer connection created");
        Ok(pc)
    }

    /// Прежний локальный поток останавливается
    pub fn set_local_stream(&self, stream: Option<MediaStream>) {
        let previous = std::mem::replace(&mut *self.local_stream.lock(), stream);
        if let Some(old) = previous {
            old.stop();
        }
    }

    /// Все дорожки потока в соединение; без соединения ничего не делает
    pub async fn add_stream(&self, stream: &MediaStream) -> Result<(), RtcError> {
        let Some(pc) = self.peer_connection() else {
            return Ok(());
        };
        for track in stream.tracks() {
            if let Some(local) = track.as_local() {
                pc.add_track(local).await?;
                debug!("Added {} track {}", track.kind().as_str(), track.id());
            }
        }
        Ok(())
    }

    pub async fn create_offer(
        &self,
        options: Option<RTCOfferOptions>,
    ) -> Result<RTCSessionDescription, RtcError> {
        let pc = self.peer_connection().ok_or(RtcError::NotInitialized)?;

        self.set_status(STATUS_CREATING_OFFER, StatusClass::None);
        let offer = pc.create_offer(options).await.inspect_err(|e| {
            error!("Failed to create offer: {e}");
        })?;
        pc.set_local_description(offer.clone()).await?;
        self.set_status(STATUS_OFFER_READY, StatusClass::Ok);

        Ok(offer)
    }

    pub async fn create_answer(&self) -> Result<RTCSessionDescription, RtcError> {
        let pc = self.peer_connection().ok_or(RtcError::NotInitialized)?;

        self.set_status(STATUS_CREATING_ANSWER, StatusClass::None);
        let answer = pc.create_answer(None).await.inspect_err(|e| {
            error!("Failed to create answer: {e}");
        })?;
        pc.set_local_description(answer.clone()).await?;
        self.set_status(STATUS_ANSWER_READY, StatusClass::Ok);

        Ok(answer)
    }

    pub async fn set_remote_description(&self, desc: RTCSessionDescription) -> Result<(), RtcError> {
        let pc = self.peer_connection().ok_or(RtcError::NotInitialized)?;
        debug!("Applying remote {}", desc.sdp_type);
        pc.set_remote_description(desc).await?;
        Ok(())
    }

    /// Входящие дорожки собеседника
    pub fn on_track<F>(&self, callback: F)
    where
        F: Fn(MediaStream) + Send + Sync + 'static,
    {
        let Some(pc) = self.peer_connection() else {
            return;
        };
        let callback = Arc::new(callback);
        pc.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let callback = callback.clone();
                Box::pin(async move {
                    info!("Remote {:?} track {} arrived", track.kind(), track.id());
                    callback(MediaStream::from_remote(track));
                })
            },
        ));
    }

    /// `callback` получает итоговое локальное описание, когда сбор кандидатов
    /// закончен (кандидат `None`)
    pub fn on_ice_candidate<F>(&self, callback: F)
    where
        F: Fn(Option<RTCSessionDescription>) + Send + Sync + 'static,
    {
        let Some(pc) = self.peer_connection() else {
            return;
        };
        let weak = Arc::downgrade(&pc);
        let callback = Arc::new(callback);
        pc.on_ice_candidate(Box::new(move |cand: Option<RTCIceCandidate>| {
            let weak = weak.clone();
            let callback = callback.clone();
            Box::pin(async move {
                match cand {
                    Some(c) => dump_candidate("local", &c),
                    None => {
                        debug!("ICE candidate gathering completed (null candidate received)");
                        if let Some(pc) = weak.upgrade() {
                            callback(pc.local_description().await);
                        }
                    }
                }
            })
        }));
    }

    /// Закрывает соединение и останавливает локальные дорожки; повторный вызов безопасен
    pub async fn close(&self) {
        self.shared.next_generation();
        let pc = self.pc.lock().take();
        if let Some(pc) = pc {
            if let Err(e) = pc.close().await {
                warn!("Error while closing peer connection: {e}");
            }
            info!("Peer connection closed");
        }
        self.set_local_stream(None);
    }
}
