// Конфигурация приложения
// Логирование можно отключить только в режиме разработки

use crate::error::ConfigError;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use webrtc::ice_transport::ice_server::RTCIceServer;

#[cfg(debug_assertions)]
pub const LOGGING_ENABLED: bool = true; // В режиме отладки логирование включено

#[cfg(not(debug_assertions))]
pub const LOGGING_ENABLED: bool = false; // В продакшене логирование отключено

/// Фильтр по умолчанию, если RUST_LOG не задан
pub const DEFAULT_LOG_FILTER: &str = "paste_call_lib=debug,webrtc=warn,info";

/// Публичные STUN серверы по умолчанию
pub const DEFAULT_STUN_URLS: [&str; 2] = [
    "stun:stun.l.google.com:19302",
    "stun:stun1.l.google.com:19302",
];

/// Дефолтный список в формате для фронтенда
pub static DEFAULT_ICE_SERVERS: Lazy<Vec<ServerConfig>> = Lazy::new(|| {
    DEFAULT_STUN_URLS
        .iter()
        .enumerate()
        .map(|(i, url)| ServerConfig {
            id: format!("default-stun-{}", i),
            r#type: "stun".into(),
            url: (*url).into(),
            username: None,
            credential: None,
        })
        .collect()
});

/// Конфигурация ICE сервера
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub id: String,
    pub r#type: String, // 'stun' or 'turn'
    pub url: String,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::EmptyUrl(self.id.clone()));
        }
        match self.r#type.as_str() {
            "stun" => Ok(()),
            "turn" if self.username.is_none() || self.credential.is_none() => {
                Err(ConfigError::MissingTurnCredentials(self.id.clone()))
            }
            "turn" => Ok(()),
            other => Err(ConfigError::UnknownType {
                id: self.id.clone(),
                kind: other.to_string(),
            }),
        }
    }

    /// URL со схемой протокола; без схемы добавляем по типу сервера
    pub fn url_with_scheme(&self) -> String {
        if self.url.starts_with("turn:") || self.url.starts_with("stun:") {
            self.url.clone()
        } else {
            let scheme = if self.r#type == "turn" { "turn:" } else { "stun:" };
            format!("{}{}", scheme, self.url)
        }
    }

    pub fn to_ice_server(&self) -> RTCIceServer {
        RTCIceServer {
            urls: vec![self.url_with_scheme()],
            username: self.username.clone().unwrap_or_default(),
            credential: self.credential.clone().unwrap_or_default(),
        }
    }
}

/// Проверяет весь список и переводит его в формат webrtc
pub fn ice_servers_from(servers: &[ServerConfig]) -> Result<Vec<RTCIceServer>, ConfigError> {
    servers
        .iter()
        .map(|s| s.validate().map(|_| s.to_ice_server()))
        .collect()
}

/// Оба STUN сервера одной записью, как их отдаёт браузерная конфигурация
pub fn default_ice_servers() -> Vec<RTCIceServer> {
    vec![RTCIceServer {
        urls: DEFAULT_STUN_URLS.iter().map(|u| (*u).to_string()).collect(),
        ..Default::default()
    }]
}
