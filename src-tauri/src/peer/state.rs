use serde::Serialize;
use webrtc::ice_transport::ice_gatherer_state::RTCIceGathererState;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;

pub const STATUS_NOT_STARTED: &str = "Not started";
pub const GATHER_NOT_STARTED: &str = "—";
pub const STATUS_CREATING_OFFER: &str = "Creating offer...";
pub const STATUS_OFFER_READY: &str =
    "Local offer created. Wait for ICE gathering to finish, then copy the local SDP to your peer.";
pub const STATUS_CREATING_ANSWER: &str = "Creating answer...";
pub const STATUS_ANSWER_READY: &str =
    "Local answer created. Once ICE finishes, copy the local SDP back to your peer.";

/// CSS-класс, которым фронтенд красит строку статуса
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StatusClass {
    #[default]
    #[serde(rename = "")]
    None,
    Ok,
    Bad,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WebRtcState {
    pub status: String,
    pub gather_status: String,
    pub status_class: StatusClass,
    pub gather_class: StatusClass,
}

impl Default for WebRtcState {
    fn default() -> Self {
        Self {
            status: STATUS_NOT_STARTED.into(),
            gather_status: GATHER_NOT_STARTED.into(),
            status_class: StatusClass::None,
            gather_class: StatusClass::None,
        }
    }
}

/// Что изменилось, плюс полный снимок после изменения
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub state: WebRtcState,
    pub connection: Option<RTCPeerConnectionState>,
}

pub fn connection_status(st: RTCPeerConnectionState) -> (String, StatusClass) {
    let class = match st {
        RTCPeerConnectionState::Connected => StatusClass::Ok,
        RTCPeerConnectionState::Failed => StatusClass::Bad,
        _ => StatusClass::None,
    };
    (format!("PeerConnection: {}", st), class)
}

pub fn gather_status(st: RTCIceGathererState) -> String {
    st.to_string()
}
