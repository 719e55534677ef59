pub mod app_state;
pub mod call;
pub mod clipboard;
pub mod config;
pub mod error;
pub mod logger;
pub mod media;
pub mod peer;
pub mod signal;
mod utils;

#[cfg(feature = "desktop")]
mod commands;
#[cfg(feature = "desktop")]
mod events;

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    logger::init();

    tauri::Builder::default()
        .plugin(tauri_plugin_clipboard_manager::init())
        .setup(|app| {
            commands::install(app.handle())?;
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // Состояние
            commands::get_app_state,
            commands::get_call_status,
            commands::select_role,
            commands::reset_call,
            // Обмен SDP
            commands::start_call,
            commands::apply_remote_sdp,
            commands::copy_local_sdp,
            commands::paste_remote_sdp,
            commands::sdp_fingerprint,
            // Видео
            commands::set_mirror,
            commands::toggle_fullscreen,
            // ICE серверы
            commands::set_ice_servers,
            commands::get_ice_servers,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
