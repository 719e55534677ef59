//! Один звонок: состояние приложения, WebRTC сессия, видео-элементы и id
//! сеанса. Команды Tauri передают сюда аргументы и рассылают события.

use crate::app_state::{AppState, Role};
use crate::clipboard::{self, ClipboardBackend};
use crate::config::{ice_servers_from, ServerConfig, DEFAULT_ICE_SERVERS};
use crate::error::{ConfigError, MediaError, RtcError, SignalError};
use crate::media::{
    set_video_source, toggle_mirror, MediaStream, TrackKind, VideoBinding, VideoElement,
};
use crate::peer::{StatusUpdate, WebRtcSession};
use crate::signal::{self, SdpPayload};
use parking_lot::Mutex;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

#[derive(Debug, Error)]
pub enum CallError {
    #[error("select a role first")]
    NoRole,

    #[error(transparent)]
    Rtc(#[from] RtcError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Signal(#[from] SignalError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

// фронтенд получает текст ошибки
impl Serialize for CallError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Готовый к копированию локальный SDP
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LocalSdpReady {
    pub text: String,
    pub fingerprint: String,
    pub sdp_type: String,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTrack {
    pub stream_id: String,
    pub kind: String,
}

/// Отвечать ли на применённое описание: только receiver и только на offer
pub fn should_answer(role: Option<Role>, sdp_type: RTCSdpType) -> bool {
    role == Some(Role::Receiver) && sdp_type == RTCSdpType::Offer
}

/// Описание в текст для собеседника; ответ идёт под id полученного offer
fn local_sdp(
    session_id: &Mutex<Option<String>>,
    desc: RTCSessionDescription,
) -> Result<LocalSdpReady, SignalError> {
    let id = session_id.lock().clone();
    let payload = match id {
        Some(id) => SdpPayload::reply(desc, id),
        None => SdpPayload::new(desc),
    };
    let text = signal::encode(&payload)?;
    *session_id.lock() = Some(payload.id);
    Ok(LocalSdpReady {
        fingerprint: signal::fingerprint(&text),
        sdp_type: payload.sdp.sdp_type.to_string(),
        text,
    })
}

pub struct CallContext {
    app_state: Arc<Mutex<AppState>>,
    rtc: WebRtcSession,
    local_video: Mutex<VideoElement>,
    remote_video: Arc<Mutex<VideoElement>>,
    session_id: Arc<Mutex<Option<String>>>,
    user_servers: Mutex<Option<Vec<ServerConfig>>>,
}

impl CallContext {
    pub fn new() -> Result<Self, RtcError> {
        Ok(Self::with_session(WebRtcSession::new()?))
    }

    pub fn with_session(rtc: WebRtcSession) -> Self {
        Self {
            app_state: Arc::new(Mutex::new(AppState::new())),
            rtc,
            local_video: Mutex::new(VideoElement::new("local")),
            remote_video: Arc::new(Mutex::new(VideoElement::new("remote"))),
            session_id: Arc::new(Mutex::new(None)),
            user_servers: Mutex::new(None),
        }
    }

    pub fn rtc(&self) -> &WebRtcSession {
        &self.rtc
    }

    pub fn app_state(&self) -> AppState {
        self.app_state.lock().snapshot()
    }

    pub fn session_id(&self) -> Option<String> {
        self.session_id.lock().clone()
    }

    pub fn select_role(&self, role: Role) -> AppState {
        info!("Role selected: {:?}", role);
        let mut st = self.app_state.lock();
        st.set_role(role);
        st.snapshot()
    }

    /// Статус соединения в состояние приложения; `true`, когда соединились
    pub fn apply_status(&self, update: &StatusUpdate) -> bool {
        let connected = update.connection == Some(RTCPeerConnectionState::Connected);
        let mut st = self.app_state.lock();
        st.set_status(update.state.status.clone());
        if connected {
            st.set_connected();
        }
        connected
    }

    /// Поток захвата, новое соединение, наблюдатели; sender сразу делает offer.
    ///
    /// `open` выполняется только после проверки роли. Возвращает привязку
    /// локального видео.
    pub async fn start_call<O, L, R>(
        &self,
        open: O,
        on_local_sdp: L,
        on_remote: R,
    ) -> Result<VideoBinding, CallError>
    where
        O: Future<Output = Result<MediaStream, CallError>>,
        L: Fn(LocalSdpReady) + Send + Sync + 'static,
        R: Fn(RemoteTrack, Option<VideoBinding>) + Send + Sync + 'static,
    {
        let role = self.app_state.lock().selected_role().ok_or(CallError::NoRole)?;
        self.app_state.lock().set_loading(true);

        let result = self.connect(role, open, on_local_sdp, on_remote).await;

        let mut st = self.app_state.lock();
        st.set_loading(false);
        if let Err(e) = &result {
            error!("Failed to start call: {e}");
            st.set_status(e.to_string());
        }
        result
    }

    async fn connect<O, L, R>(
        &self,
        role: Role,
        open: O,
        on_local_sdp: L,
        on_remote: R,
    ) -> Result<VideoBinding, CallError>
    where
        O: Future<Output = Result<MediaStream, CallError>>,
        L: Fn(LocalSdpReady) + Send + Sync + 'static,
        R: Fn(RemoteTrack, Option<VideoBinding>) + Send + Sync + 'static,
    {
        let stream = open.await?;

        self.rtc.create_peer_connection().await?;
        self.rtc.set_local_stream(Some(stream.clone()));
        self.rtc.add_stream(&stream).await?;

        let binding = {
            let mut local = self.local_video.lock();
            set_video_source(Some(&mut *local), Some(stream));
            local.binding()
        };

        let remote_video = self.remote_video.clone();
        self.rtc.on_track(move |remote: MediaStream| {
            let kind = remote.tracks().first().map(|t| t.kind());
            let track = RemoteTrack {
                stream_id: remote.id().to_string(),
                kind: kind.map(|k| k.as_str().to_string()).unwrap_or_default(),
            };
            // звук в видео-элемент не ставим, чтобы не сбросить картинку
            let binding = (kind == Some(TrackKind::Video)).then(|| {
                let mut video = remote_video.lock();
                set_video_source(Some(&mut *video), Some(remote));
                video.binding()
            });
            on_remote(track, binding);
        });

        let session_id = self.session_id.clone();
        let app_state = self.app_state.clone();
        self.rtc.on_ice_candidate(move |desc| {
            let Some(desc) = desc else { return };
            match local_sdp(&session_id, desc) {
                Ok(ready) => {
                    app_state.lock().set_local_sdp(ready.text.clone());
                    on_local_sdp(ready);
                }
                Err(e) => error!("Failed to encode local description: {e}"),
            }
        });

        if role == Role::Sender {
            self.rtc.create_offer(None).await?;
        }
        Ok(binding)
    }

    /// Применяет SDP собеседника; `true`, если в ответ создан answer
    pub async fn apply_remote_sdp(&self, text: String) -> Result<bool, CallError> {
        let payload = signal::decode(&text)?;
        info!(
            "Applying remote {} for session {}",
            payload.sdp.sdp_type, payload.id
        );
        self.app_state.lock().set_remote_sdp(text);
        *self.session_id.lock() = Some(payload.id);

        let answer = should_answer(self.app_state.lock().selected_role(), payload.sdp.sdp_type);
        self.rtc.set_remote_description(payload.sdp).await?;

        if answer {
            self.rtc.create_answer().await?;
        }
        Ok(answer)
    }

    pub fn copy_local_sdp<B: ClipboardBackend + ?Sized>(&self, clipboard: &B) -> bool {
        let text = self.app_state.lock().local_sdp().to_string();
        clipboard::write_text(clipboard, &text)
    }

    /// Пустой буфер не затирает уже вставленный текст
    pub fn paste_remote_sdp<B: ClipboardBackend + ?Sized>(&self, clipboard: &B) -> String {
        let text = clipboard::read_text(clipboard);
        if !text.is_empty() {
            self.app_state.lock().set_remote_sdp(text.clone());
        }
        text
    }

    pub fn set_mirror(&self, enabled: bool) -> VideoBinding {
        let mut local = self.local_video.lock();
        toggle_mirror(Some(&mut *local), enabled);
        local.binding()
    }

    /// Закрывает звонок и возвращает всё к выбору роли; отдаёт новые привязки
    /// локального и удалённого видео
    pub async fn reset(&self) -> (AppState, [VideoBinding; 2]) {
        self.rtc.close().await;
        self.rtc.reset_state();
        *self.session_id.lock() = None;

        let bindings = [&self.local_video, &*self.remote_video].map(|video| {
            let mut v = video.lock();
            set_video_source(Some(&mut *v), None);
            v.binding()
        });

        let mut st = self.app_state.lock();
        st.reset();
        (st.snapshot(), bindings)
    }

    pub fn set_ice_servers(&self, servers: Vec<ServerConfig>) -> Result<(), CallError> {
        info!("Setting {} custom ICE servers", servers.len());
        let ice = ice_servers_from(&servers)?;
        self.rtc.set_ice_servers(ice);
        *self.user_servers.lock() = Some(servers);
        Ok(())
    }

    pub fn ice_servers(&self) -> Vec<ServerConfig> {
        self.user_servers
            .lock()
            .clone()
            .unwrap_or_else(|| DEFAULT_ICE_SERVERS.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::AppView;
    use crate::media::{get_user_media, CaptureHandle, MediaConstraints, MediaDevices};
    use crate::peer::WebRtcState;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct Loopback;

    impl MediaDevices for Loopback {
        fn open(
            &self,
            kind: TrackKind,
            _constraints: &MediaConstraints,
        ) -> Result<CaptureHandle, MediaError> {
            let (_tx, rx) = mpsc::channel(1);
            Ok(CaptureHandle::new(kind.as_str(), rx, || {}))
        }
    }

    fn call() -> CallContext {
        // без STUN, чтобы тесты не ходили в сеть
        CallContext::with_session(WebRtcSession::with_ice_servers(vec![]).unwrap())
    }

    fn camera() -> impl Future<Output = Result<MediaStream, CallError>> {
        async {
            get_user_media(&Loopback, &MediaConstraints::camera_and_microphone())
                .map_err(CallError::from)
        }
    }

    async fn start(
        call: &CallContext,
    ) -> (Result<VideoBinding, CallError>, mpsc::UnboundedReceiver<LocalSdpReady>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let result = call
            .start_call(
                camera(),
                move |ready| {
                    let _ = tx.send(ready);
                },
                |_, _| {},
            )
            .await;
        (result, rx)
    }

    async fn next_sdp(rx: &mut mpsc::UnboundedReceiver<LocalSdpReady>) -> LocalSdpReady {
        tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("gathering did not complete")
            .expect("callback dropped")
    }

    fn update(status: &str, connection: Option<RTCPeerConnectionState>) -> StatusUpdate {
        StatusUpdate {
            state: WebRtcState {
                status: status.to_string(),
                ..Default::default()
            },
            connection,
        }
    }

    #[test]
    fn only_receiver_answers_an_offer() {
        assert!(should_answer(Some(Role::Receiver), RTCSdpType::Offer));
        assert!(!should_answer(Some(Role::Receiver), RTCSdpType::Answer));
        assert!(!should_answer(Some(Role::Sender), RTCSdpType::Offer));
        assert!(!should_answer(Some(Role::Sender), RTCSdpType::Answer));
        assert!(!should_answer(None, RTCSdpType::Offer));
    }

    #[tokio::test]
    async fn connected_state_switches_view() {
        let c = call();
        c.select_role(Role::Sender);

        assert!(!c.apply_status(&update(
            "PeerConnection: connecting",
            Some(RTCPeerConnectionState::Connecting)
        )));
        let st = c.app_state();
        assert_eq!(st.current_view(), AppView::SdpExchange);
        assert_eq!(st.connection_status(), "PeerConnection: connecting");

        assert!(c.apply_status(&update(
            "PeerConnection: connected",
            Some(RTCPeerConnectionState::Connected)
        )));
        let st = c.app_state();
        assert!(st.is_connected());
        assert_eq!(st.current_view(), AppView::Connected);

        // статус без состояния соединения вид не меняет
        let c = call();
        c.select_role(Role::Receiver);
        assert!(!c.apply_status(&update("Offer ready", None)));
        assert_eq!(c.app_state().current_view(), AppView::SdpExchange);
    }

    #[tokio::test]
    async fn start_requires_role_and_does_not_open_devices() {
        let c = call();
        let opened = Arc::new(Mutex::new(false));
        let flag = opened.clone();
        let open = async move {
            *flag.lock() = true;
            camera().await
        };
        let err = c.start_call(open, |_| {}, |_, _| {}).await.unwrap_err();
        assert!(matches!(err, CallError::NoRole));
        assert!(!*opened.lock());
        assert!(c.rtc().peer_connection().is_none());
    }

    #[tokio::test]
    async fn device_failure_lands_in_status() {
        let c = call();
        c.select_role(Role::Sender);
        let open = async { Err::<MediaStream, _>(CallError::Media(MediaError::DeviceNotFound("video"))) };
        let err = c.start_call(open, |_| {}, |_, _| {}).await.unwrap_err();

        let st = c.app_state();
        assert!(!st.is_loading());
        assert_eq!(st.connection_status(), err.to_string());
        assert!(c.rtc().peer_connection().is_none());
    }

    #[tokio::test]
    async fn answer_reuses_offer_session_id() {
        let sender = call();
        let receiver = call();

        sender.select_role(Role::Sender);
        let (binding, mut sender_sdp) = start(&sender).await;
        assert!(binding.unwrap().stream_id.is_some());
        let offer = next_sdp(&mut sender_sdp).await;
        assert_eq!(offer.sdp_type, "offer");
        assert_eq!(sender.app_state().local_sdp(), offer.text);
        let offer_id = signal::decode(&offer.text).unwrap().id;
        assert_eq!(sender.session_id().as_deref(), Some(offer_id.as_str()));

        receiver.select_role(Role::Receiver);
        let (_, mut receiver_sdp) = start(&receiver).await;
        // receiver без offer ничего не публикует
        assert!(receiver.app_state().local_sdp().is_empty());

        assert!(receiver.apply_remote_sdp(offer.text.clone()).await.unwrap());
        assert_eq!(receiver.app_state().remote_sdp(), offer.text);
        let answer = next_sdp(&mut receiver_sdp).await;
        assert_eq!(answer.sdp_type, "answer");
        assert_eq!(signal::decode(&answer.text).unwrap().id, offer_id);

        // sender на answer не отвечает
        assert!(!sender.apply_remote_sdp(answer.text).await.unwrap());

        sender.reset().await;
        receiver.reset().await;
    }

    #[tokio::test]
    async fn sender_ignores_pasted_offer() {
        let sender = call();
        let other = call();
        sender.select_role(Role::Sender);
        other.select_role(Role::Sender);
        let (_, _sdp) = start(&sender).await;
        let (_, mut other_sdp) = start(&other).await;
        let offer = next_sdp(&mut other_sdp).await;

        // чужой offer поверх своего: платформа отказывает, answer не создаётся
        let result = sender.apply_remote_sdp(offer.text).await;
        assert!(!matches!(result, Ok(true)));

        sender.reset().await;
        other.reset().await;
    }

    #[tokio::test]
    async fn reset_clears_session_and_video() {
        let c = call();
        c.select_role(Role::Sender);
        let (binding, mut sdp) = start(&c).await;
        assert!(binding.unwrap().stream_id.is_some());
        next_sdp(&mut sdp).await;
        assert!(c.session_id().is_some());
        let stream = c.rtc().local_stream().unwrap();

        let (st, [local, remote]) = c.reset().await;

        assert_eq!(st, AppState::new());
        assert_eq!(c.app_state(), AppState::new());
        assert!(c.session_id().is_none());
        assert_eq!(local.stream_id, None);
        assert_eq!(remote.stream_id, None);
        assert!(!local.playing);
        assert!(!stream.is_active());
        assert!(c.rtc().peer_connection().is_none());
    }

    #[tokio::test]
    async fn mirror_only_touches_local_video() {
        let c = call();
        let b = c.set_mirror(true);
        assert_eq!(b.element, "local");
        assert!(b.mirrored);
        assert!(!c.set_mirror(false).mirrored);
    }

    #[test]
    fn custom_ice_servers_replace_defaults() {
        let c = call();
        assert_eq!(c.ice_servers().len(), DEFAULT_ICE_SERVERS.len());

        let servers: Vec<ServerConfig> = serde_json::from_value(serde_json::json!([
            { "id": "a", "type": "stun", "url": "stun.example.org:3478" }
        ]))
        .unwrap();
        c.set_ice_servers(servers).unwrap();
        assert_eq!(c.ice_servers().len(), 1);
        assert_eq!(c.rtc().ice_servers().len(), 1);

        let bad: Vec<ServerConfig> = serde_json::from_value(serde_json::json!([
            { "id": "b", "type": "turn", "url": "turn.example.org" }
        ]))
        .unwrap();
        assert!(matches!(
            c.set_ice_servers(bad),
            Err(CallError::Config(ConfigError::MissingTurnCredentials(_)))
        ));
        assert_eq!(c.ice_servers().len(), 1);
    }
}
