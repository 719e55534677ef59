use crate::app_state::{AppState, Role};
use crate::call::{CallContext, CallError};
use crate::config::ServerConfig;
use crate::error::RtcError;
use crate::events;
use crate::media::{get_user_media, MediaConstraints, SystemDevices, VideoBinding};
use crate::peer::{StatusUpdate, WebRtcState};
use std::sync::Arc;
use tauri::{command, AppHandle, Manager, Runtime, State, WebviewWindow};

type CmdResult<T> = Result<T, CallError>;

/// Регистрирует контекст и связывает статус соединения с состоянием приложения
pub fn install<R: Runtime>(app: &AppHandle<R>) -> Result<(), RtcError> {
    app.manage(CallContext::new()?);

    let handle = app.clone();
    app.state::<CallContext>()
        .rtc()
        .on_status_change(Arc::new(move |update: StatusUpdate| {
            on_status(&handle, update)
        }));
    Ok(())
}

fn on_status<R: Runtime>(app: &AppHandle<R>, update: StatusUpdate) {
    let ctx = app.state::<CallContext>();
    let connected = ctx.apply_status(&update);
    events::emit(app, events::CALL_STATUS, update.state);
    if connected {
        events::emit(app, events::CALL_CONNECTED, ctx.app_state());
    }
}

fn emit_binding<R: Runtime>(app: &AppHandle<R>, binding: VideoBinding) {
    events::emit(app, events::VIDEO_SOURCE, binding);
}

#[command]
pub fn get_app_state(ctx: State<'_, CallContext>) -> AppState {
    ctx.app_state()
}

#[command]
pub fn get_call_status(ctx: State<'_, CallContext>) -> WebRtcState {
    ctx.rtc().state()
}

#[command]
pub fn select_role(ctx: State<'_, CallContext>, role: Role) -> AppState {
    ctx.select_role(role)
}

/// Камера, новое соединение, наблюдатели; sender сразу делает offer
#[command]
pub async fn start_call<R: Runtime>(
    app: AppHandle<R>,
    ctx: State<'_, CallContext>,
    constraints: Option<MediaConstraints>,
) -> CmdResult<()> {
    let constraints = constraints.unwrap_or_else(MediaConstraints::camera_and_microphone);
    // устройства открываются в своих потоках; ждём их не на рантайме
    let open = async move {
        let stream =
            tokio::task::spawn_blocking(move || get_user_media(&SystemDevices, &constraints))
                .await??;
        Ok::<_, CallError>(stream)
    };

    let local_sdp = app.clone();
    let remote = app.clone();
    let binding = ctx
        .start_call(
            open,
            move |ready| events::emit(&local_sdp, events::LOCAL_SDP_READY, ready),
            move |track, binding| {
                events::emit(&remote, events::REMOTE_TRACK, track);
                if let Some(binding) = binding {
                    emit_binding(&remote, binding);
                }
            },
        )
        .await?;
    emit_binding(&app, binding);
    Ok(())
}

/// Применяет SDP собеседника; receiver отвечает на offer
#[command]
pub async fn apply_remote_sdp(ctx: State<'_, CallContext>, text: String) -> CmdResult<()> {
    ctx.apply_remote_sdp(text).await?;
    Ok(())
}

#[command]
pub fn copy_local_sdp<R: Runtime>(app: AppHandle<R>, ctx: State<'_, CallContext>) -> bool {
    ctx.copy_local_sdp(&app)
}

#[command]
pub fn paste_remote_sdp<R: Runtime>(app: AppHandle<R>, ctx: State<'_, CallContext>) -> String {
    ctx.paste_remote_sdp(&app)
}

#[command]
pub fn sdp_fingerprint(text: String) -> String {
    crate::signal::fingerprint(&text)
}

#[command]
pub fn set_mirror<R: Runtime>(
    app: AppHandle<R>,
    ctx: State<'_, CallContext>,
    enabled: bool,
) -> VideoBinding {
    let binding = ctx.set_mirror(enabled);
    emit_binding(&app, binding.clone());
    binding
}

#[command]
pub fn toggle_fullscreen<R: Runtime>(window: WebviewWindow<R>) {
    crate::media::toggle_fullscreen(&window, Some(&window));
}

/// Закрывает звонок и возвращает всё к выбору роли
#[command]
pub async fn reset_call<R: Runtime>(
    app: AppHandle<R>,
    ctx: State<'_, CallContext>,
) -> CmdResult<AppState> {
    let (state, bindings) = ctx.reset().await;
    for binding in bindings {
        emit_binding(&app, binding);
    }
    Ok(state)
}

#[command]
pub fn set_ice_servers(ctx: State<'_, CallContext>, servers: Vec<ServerConfig>) -> CmdResult<()> {
    ctx.set_ice_servers(servers)
}

#[command]
pub fn get_ice_servers(ctx: State<'_, CallContext>) -> Vec<ServerConfig> {
    ctx.ice_servers()
}
