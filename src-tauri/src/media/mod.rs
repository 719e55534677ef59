pub mod capture;
pub mod fullscreen;
pub mod stream;
pub mod video;

pub use capture::{CaptureHandle, RawFrame};
pub use fullscreen::{
    enter_fullscreen, exit_fullscreen, is_fullscreen, toggle_fullscreen, FullscreenApi,
    FullscreenHost, FullscreenTarget,
};
pub use stream::{
    get_user_media, MediaConstraints, MediaDevices, MediaStream, MediaTrack, SystemDevices,
    TrackKind, VideoConstraint,
};
pub use video::{play_video, set_video_source, toggle_mirror, VideoBinding, VideoElement, VideoSink};
