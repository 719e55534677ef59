use crate::error::ClipboardError;
use tracing::warn;

/// Доступ к системному буферу обмена
pub trait ClipboardBackend {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
    fn read_text(&self) -> Result<String, ClipboardError>;
}

/// Запись в буфер; ошибки платформы только логируются
pub fn write_text<B: ClipboardBackend + ?Sized>(backend: &B, text: &str) -> bool {
    match backend.write_text(text) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to copy to clipboard: {e}");
            false
        }
    }
}

/// Чтение из буфера; при ошибке пустая строка
pub fn read_text<B: ClipboardBackend + ?Sized>(backend: &B) -> String {
    backend.read_text().unwrap_or_else(|e| {
        warn!("Failed to read from clipboard: {e}");
        String::new()
    })
}

#[cfg(feature = "desktop")]
impl<R: tauri::Runtime> ClipboardBackend for tauri::AppHandle<R> {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        use tauri_plugin_clipboard_manager::ClipboardExt;
        self.clipboard()
            .write_text(text.to_string())
            .map_err(|e| ClipboardError(e.to_string()))
    }

    fn read_text(&self) -> Result<String, ClipboardError> {
        use tauri_plugin_clipboard_manager::ClipboardExt;
        self.clipboard()
            .read_text()
            .map_err(|e| ClipboardError(e.to_string()))
    }
}
