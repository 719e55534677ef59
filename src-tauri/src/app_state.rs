use serde::{Deserialize, Serialize};

/// Экран, который сейчас показывает интерфейс
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AppView {
    #[default]
    RoleSelection,
    SdpExchange,
    Connected,
}

/// sender делает offer, receiver отвечает answer
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Sender,
    Receiver,
}

/// Состояние одного сеанса звонка
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    current_view: AppView,
    selected_role: Option<Role>,
    is_connected: bool,
    #[serde(rename = "localSDP")]
    local_sdp: String,
    #[serde(rename = "remoteSDP")]
    remote_sdp: String,
    connection_status: String,
    is_loading: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_view(&self) -> AppView {
        self.current_view
    }

    pub fn selected_role(&self) -> Option<Role> {
        self.selected_role
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected
    }

    pub fn local_sdp(&self) -> &str {
        &self.local_sdp
    }

    pub fn remote_sdp(&self) -> &str {
        &self.remote_sdp
    }

    pub fn connection_status(&self) -> &str {
        &self.connection_status
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn is_sender(&self) -> bool {
        self.selected_role == Some(Role::Sender)
    }

    pub fn is_receiver(&self) -> bool {
        self.selected_role == Some(Role::Receiver)
    }

    pub fn set_role(&mut self, role: Role) {
        self.selected_role = Some(role);
        self.current_view = AppView::SdpExchange;
    }

    pub fn set_connected(&mut self) {
        self.is_connected = true;
        self.current_view = AppView::Connected;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn set_local_sdp(&mut self, sdp: impl Into<String>) {
        self.local_sdp = sdp.into();
    }

    pub fn set_remote_sdp(&mut self, sdp: impl Into<String>) {
        self.remote_sdp = sdp.into();
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.connection_status = status.into();
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.is_loading = loading;
    }

    /// Копия для отправки во фронтенд
    pub fn snapshot(&self) -> AppState {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_on_role_selection() {
        let s = AppState::new();
        assert_eq!(s.current_view(), AppView::RoleSelection);
        assert_eq!(s.selected_role(), None);
        assert!(!s.is_connected());
        assert!(!s.is_sender() && !s.is_receiver());
        assert_eq!(s.local_sdp(), "");
        assert_eq!(s.connection_status(), "");
        assert!(!s.is_loading());
    }

    #[test]
    fn set_role_moves_to_sdp_exchange() {
        let mut s = AppState::new();
        s.set_role(Role::Receiver);
        assert_eq!(s.current_view(), AppView::SdpExchange);
        assert_eq!(s.selected_role(), Some(Role::Receiver));
        assert!(s.is_receiver());
        assert!(!s.is_sender());
    }

    #[test]
    fn set_connected_moves_to_connected() {
        let mut s = AppState::new();
        s.set_role(Role::Sender);
        s.set_connected();
        assert!(s.is_connected());
        assert_eq!(s.current_view(), AppView::Connected);
    }

    #[test]
    fn reset_restores_every_field() {
        let mut s = AppState::new();
        s.set_role(Role::Sender);
        s.set_connected();
        s.set_local_sdp("v=0 local");
        s.set_remote_sdp("v=0 remote");
        s.set_status("PeerConnection: connected");
        s.set_loading(true);

        s.reset();
        assert_eq!(s, AppState::default());

        // и из начального состояния тоже
        s.reset();
        assert_eq!(s, AppState::default());
    }

    #[test]
    fn snapshot_serializes_for_the_webview() {
        let mut s = AppState::new();
        s.set_role(Role::Sender);
        s.set_local_sdp("abc");
        let json = serde_json::to_value(s.snapshot()).unwrap();
        assert_eq!(json["currentView"], "sdp-exchange");
        assert_eq!(json["selectedRole"], "sender");
        assert_eq!(json["localSDP"], "abc");
        assert_eq!(json["isLoading"], false);
    }
}
