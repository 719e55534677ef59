use crate::error::FullscreenError;
use tracing::{debug, warn};

/// Варианты полноэкранного API; порядок перебора фиксирован
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullscreenApi {
    Standard,
    Webkit,
    Ms,
    /// `webkitEnterFullscreen` у видео на iOS, только вход
    IosVideo,
}

/// Порядок для входа, выхода и проверки состояния
pub const API_ORDER: [FullscreenApi; 3] =
    [FullscreenApi::Standard, FullscreenApi::Webkit, FullscreenApi::Ms];

/// Документ/окно: знает, кто сейчас в полноэкранном режиме
pub trait FullscreenHost {
    fn has_fullscreen_element(&self, api: FullscreenApi) -> bool;
    fn can_exit(&self, api: FullscreenApi) -> bool;
    fn exit(&self, api: FullscreenApi) -> Result<(), FullscreenError>;
}

/// Элемент, который можно развернуть
pub trait FullscreenTarget {
    fn can_request(&self, api: FullscreenApi) -> bool;
    fn request(&self, api: FullscreenApi) -> Result<(), FullscreenError>;
}

pub fn is_fullscreen<H: FullscreenHost + ?Sized>(host: &H) -> bool {
    API_ORDER.iter().any(|api| host.has_fullscreen_element(*api))
}

pub fn enter_fullscreen<T: FullscreenTarget + ?Sized>(target: &T) {
    if let Some(api) = API_ORDER.into_iter().find(|api| target.can_request(*api)) {
        debug!("Requesting fullscreen via {:?}", api);
        match target.request(api) {
            Ok(()) => return,
            Err(e) => warn!("Entering fullscreen failed: {e}"),
        }
    }

    if target.can_request(FullscreenApi::IosVideo) {
        if let Err(e) = target.request(FullscreenApi::IosVideo) {
            warn!("iOS fullscreen failed: {e}");
        }
    }
}

pub fn exit_fullscreen<H: FullscreenHost + ?Sized>(host: &H) {
    let Some(api) = API_ORDER.into_iter().find(|api| host.can_exit(*api)) else {
        return;
    };
    if let Err(e) = host.exit(api) {
        warn!("Exiting fullscreen failed: {e}");
    }
}

pub fn toggle_fullscreen<H, T>(host: &H, target: Option<&T>)
where
    H: FullscreenHost + ?Sized,
    T: FullscreenTarget + ?Sized,
{
    let Some(target) = target else { return };
    if is_fullscreen(host) {
        exit_fullscreen(host);
    } else {
        enter_fullscreen(target);
    }
}

// У окна Tauri только стандартный вариант
#[cfg(feature = "desktop")]
impl<R: tauri::Runtime> FullscreenHost for tauri::WebviewWindow<R> {
    fn has_fullscreen_element(&self, api: FullscreenApi) -> bool {
        api == FullscreenApi::Standard && self.is_fullscreen().unwrap_or(false)
    }

    fn can_exit(&self, api: FullscreenApi) -> bool {
        api == FullscreenApi::Standard
    }

    fn exit(&self, _api: FullscreenApi) -> Result<(), FullscreenError> {
        self.set_fullscreen(false)
            .map_err(|e| FullscreenError(e.to_string()))
    }
}

#[cfg(feature = "desktop")]
impl<R: tauri::Runtime> FullscreenTarget for tauri::WebviewWindow<R> {
    fn can_request(&self, api: FullscreenApi) -> bool {
        api == FullscreenApi::Standard
    }

    fn request(&self, _api: FullscreenApi) -> Result<(), FullscreenError> {
        self.set_fullscreen(true)
            .map_err(|e| FullscreenError(e.to_string()))
    }
}
