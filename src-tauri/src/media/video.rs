use super::stream::MediaStream;
use crate::error::MediaError;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info};

pub const MIRROR_CLASS: &str = "mirror";

/// Поверхность, на которую выводится поток
pub trait VideoSink {
    fn set_src_object(&mut self, stream: Option<MediaStream>);
    fn play(&mut self) -> Result<(), MediaError>;
    fn set_class(&mut self, class: &str, enabled: bool);
}

/// Модель видео-элемента; фронтенд рисует по его `binding()`
#[derive(Debug)]
pub struct VideoElement {
    name: &'static str,
    src: Option<MediaStream>,
    classes: BTreeSet<String>,
    playing: bool,
}

/// Что сейчас привязано к элементу
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VideoBinding {
    pub element: &'static str,
    pub stream_id: Option<String>,
    pub mirrored: bool,
    pub playing: bool,
}

impl VideoElement {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            src: None,
            classes: BTreeSet::new(),
            playing: false,
        }
    }

    pub fn src_object(&self) -> Option<&MediaStream> {
        self.src.as_ref()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn binding(&self) -> VideoBinding {
        VideoBinding {
            element: self.name,
            stream_id: self.src.as_ref().map(|s| s.id().to_string()),
            mirrored: self.has_class(MIRROR_CLASS),
            playing: self.playing,
        }
    }
}

impl VideoSink for VideoElement {
    fn set_src_object(&mut self, stream: Option<MediaStream>) {
        self.playing = false;
        self.src = stream;
    }

    fn play(&mut self) -> Result<(), MediaError> {
        match &self.src {
            Some(stream) if stream.is_active() => {
                self.playing = true;
                Ok(())
            }
            Some(stream) => Err(MediaError::Playback(format!(
                "stream {} has no live tracks",
                stream.id()
            ))),
            None => Err(MediaError::Playback("no source".into())),
        }
    }

    fn set_class(&mut self, class: &str, enabled: bool) {
        if enabled {
            self.classes.insert(class.to_string());
        } else {
            self.classes.remove(class);
        }
    }
}

/// Запуск воспроизведения; отказ автоплея только логируется
pub fn play_video<S: VideoSink + ?Sized>(video: Option<&mut S>) {
    let Some(video) = video else { return };
    if let Err(e) = video.play() {
        info!("Autoplay failed: {e}");
    }
}

pub fn set_video_source<S: VideoSink + ?Sized>(video: Option<&mut S>, stream: Option<MediaStream>) {
    let Some(video) = video else { return };
    let has_stream = stream.is_some();
    video.set_src_object(stream);
    if has_stream {
        play_video(Some(video));
    }
}

pub fn toggle_mirror<S: VideoSink + ?Sized>(video: Option<&mut S>, enabled: bool) {
    let Some(video) = video else { return };
    debug!("Mirror {}", if enabled { "on" } else { "off" });
    video.set_class(MIRROR_CLASS, enabled);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::stream::{MediaTrack, TrackKind};

    fn live_stream() -> MediaStream {
        MediaStream::new("s1", vec![MediaTrack::local(TrackKind::Video, "s1")])
    }

    #[test]
    fn binding_a_stream_starts_playback() {
        let mut v = VideoElement::new("local");
        set_video_source(Some(&mut v), Some(live_stream()));
        assert!(v.is_playing());
        assert_eq!(v.binding().stream_id.as_deref(), Some("s1"));
    }

    #[test]
    fn clearing_the_source_does_not_play() {
        let mut v = VideoElement::new("remote");
        set_video_source(Some(&mut v), Some(live_stream()));
        set_video_source(Some(&mut v), None);
        assert!(v.src_object().is_none());
        assert!(!v.is_playing());
    }

    #[test]
    fn autoplay_failure_is_swallowed() {
        let stream = live_stream();
        stream.stop();
        let mut v = VideoElement::new("remote");
        set_video_source(Some(&mut v), Some(stream));
        assert!(v.src_object().is_some());
        assert!(!v.is_playing());
    }

    #[test]
    fn mirror_toggles_class() {
        let mut v = VideoElement::new("local");
        toggle_mirror(Some(&mut v), true);
        assert!(v.binding().mirrored);
        toggle_mirror(Some(&mut v), false);
        assert!(!v.has_class(MIRROR_CLASS));
    }

    #[test]
    fn missing_element_is_a_no_op() {
        set_video_source::<VideoElement>(None, Some(live_stream()));
        toggle_mirror::<VideoElement>(None, true);
        play_video::<VideoElement>(None);
    }
}
