//! Открытые устройства захвата.
//!
//! Камера (opencv) и микрофон (cpal) работают в своих потоках: поток держит
//! устройство, отдаёт сырые кадры в очередь и освобождает устройство, когда
//! `CaptureHandle` отпускают. Кодирование кадров сюда не входит.

use bytes::Bytes;
use std::fmt;
use tokio::sync::mpsc;
use tracing::debug;

/// Сколько сырых кадров ждёт потребителя; лишние отбрасываются
pub const FRAME_QUEUE: usize = 8;

/// Несжатый кадр с устройства
#[derive(Debug, Clone)]
pub enum RawFrame {
    /// BGR, как отдаёт opencv
    Video { data: Bytes, width: u32, height: u32 },
    /// Чередующиеся i16 сэмплы
    Audio {
        samples: Vec<i16>,
        sample_rate: u32,
        channels: u16,
    },
}

type Release = Box<dyn FnOnce() + Send>;

/// Открытое устройство; `release` (или drop) отпускает его
pub struct CaptureHandle {
    label: String,
    frames: Option<mpsc::Receiver<RawFrame>>,
    release: Option<Release>,
}

impl fmt::Debug for CaptureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureHandle")
            .field("label", &self.label)
            .field("released", &self.is_released())
            .finish()
    }
}

impl CaptureHandle {
    pub fn new(
        label: impl Into<String>,
        frames: mpsc::Receiver<RawFrame>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            frames: Some(frames),
            release: Some(Box::new(release)),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_released(&self) -> bool {
        self.release.is_none()
    }

    /// Очередь кадров забирает один потребитель
    pub fn take_frames(&mut self) -> Option<mpsc::Receiver<RawFrame>> {
        self.frames.take()
    }

    pub fn release(&mut self) {
        if let Some(release) = self.release.take() {
            self.frames = None;
            release();
            debug!("Released capture device {}", self.label);
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(feature = "capture")]
pub use system::{open_camera, open_microphone};

#[cfg(feature = "capture")]
mod system {
    use super::{CaptureHandle, RawFrame, FRAME_QUEUE};
    use crate::error::MediaError;
    use crate::media::stream::VideoConstraint;
    use bytes::Bytes;
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::{FromSample, Sample, SizedSample};
    use opencv::prelude::*;
    use opencv::videoio::{
        VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_HEIGHT, CAP_PROP_FRAME_WIDTH,
    };
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{mpsc as std_mpsc, Arc};
    use std::thread;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tracing::{error, info, warn};

    const CAMERA_INDEX: i32 = 0;

    fn unavailable(kind: &'static str, reason: impl ToString) -> MediaError {
        MediaError::DeviceUnavailable {
            kind,
            reason: reason.to_string(),
        }
    }

    /// Поток ждёт открытия устройства и сообщает результат до захвата кадров
    fn wait_ready(
        kind: &'static str,
        ready: std_mpsc::Receiver<Result<(), MediaError>>,
        worker: thread::JoinHandle<()>,
    ) -> Result<thread::JoinHandle<()>, MediaError> {
        match ready.recv() {
            Ok(Ok(())) => Ok(worker),
            Ok(Err(e)) => {
                let _ = worker.join();
                Err(e)
            }
            Err(_) => {
                let _ = worker.join();
                Err(unavailable(kind, "capture thread exited"))
            }
        }
    }

    fn open_capture(video: &VideoConstraint) -> Result<VideoCapture, MediaError> {
        let mut capture = VideoCapture::new(CAMERA_INDEX, CAP_ANY)
            .map_err(|e| unavailable("video", format!("failed to open camera: {e}")))?;
        let opened = capture
            .is_opened()
            .map_err(|e| unavailable("video", e))?;
        if !opened {
            return Err(MediaError::DeviceNotFound("video"));
        }

        if let VideoConstraint::Detailed(c) = video {
            if let Some(w) = c.width {
                let _ = capture.set(CAP_PROP_FRAME_WIDTH, f64::from(w));
            }
            if let Some(h) = c.height {
                let _ = capture.set(CAP_PROP_FRAME_HEIGHT, f64::from(h));
            }
            if let Some(fps) = c.frame_rate {
                let _ = capture.set(CAP_PROP_FPS, f64::from(fps));
            }
        }
        Ok(capture)
    }

    pub fn open_camera(video: &VideoConstraint) -> Result<CaptureHandle, MediaError> {
        let (ready_tx, ready_rx) = std_mpsc::sync_channel(1);
        let (frame_tx, frame_rx) = mpsc::channel(FRAME_QUEUE);
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let video = video.clone();

        let worker = thread::Builder::new()
            .name("camera-capture".into())
            .spawn(move || {
                let mut capture = match open_capture(&video) {
                    Ok(c) => {
                        let _ = ready_tx.send(Ok(()));
                        c
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                info!("Camera opened");

                let mut mat = Mat::default();
                while flag.load(Ordering::SeqCst) {
                    match capture.read(&mut mat) {
                        Ok(true) if !mat.empty() => {
                            let Ok(data) = mat.data_bytes() else { continue };
                            let frame = RawFrame::Video {
                                data: Bytes::copy_from_slice(data),
                                width: mat.cols() as u32,
                                height: mat.rows() as u32,
                            };
                            let _ = frame_tx.try_send(frame);
                        }
                        Ok(_) => thread::sleep(Duration::from_millis(10)),
                        Err(e) => {
                            error!("Camera read failed: {e}");
                            break;
                        }
                    }
                }

                if let Err(e) = capture.release() {
                    warn!("Error releasing camera: {e}");
                }
                info!("Camera closed");
            })
            .map_err(|e| unavailable("video", e))?;

        let worker = wait_ready("video", ready_rx, worker)?;
        Ok(CaptureHandle::new("camera", frame_rx, move || {
            running.store(false, Ordering::SeqCst);
            let _ = worker.join();
        }))
    }

    fn build_input<T>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        frames: mpsc::Sender<RawFrame>,
    ) -> Result<cpal::Stream, cpal::BuildStreamError>
    where
        T: SizedSample + Send + 'static,
        i16: FromSample<T>,
    {
        let sample_rate = config.sample_rate.0;
        let channels = config.channels;
        device.build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let samples = data.iter().map(|s| s.to_sample::<i16>()).collect();
                let _ = frames.try_send(RawFrame::Audio {
                    samples,
                    sample_rate,
                    channels,
                });
            },
            |e| error!("Audio input error: {e}"),
            None,
        )
    }

    /// cpal::Stream не Send: поток владеет им до сигнала остановки
    fn open_input(frames: mpsc::Sender<RawFrame>) -> Result<cpal::Stream, MediaError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(MediaError::DeviceNotFound("audio"))?;
        info!("Using input device: {}", device.name().unwrap_or_default());

        let supported = device
            .default_input_config()
            .map_err(|e| unavailable("audio", e))?;
        let format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();

        let stream = match format {
            cpal::SampleFormat::F32 => build_input::<f32>(&device, &config, frames),
            cpal::SampleFormat::I16 => build_input::<i16>(&device, &config, frames),
            cpal::SampleFormat::U16 => build_input::<u16>(&device, &config, frames),
            other => {
                return Err(unavailable(
                    "audio",
                    format!("unsupported sample format {other:?}"),
                ))
            }
        }
        .map_err(|e| unavailable("audio", e))?;

        stream.play().map_err(|e| unavailable("audio", e))?;
        Ok(stream)
    }

    pub fn open_microphone() -> Result<CaptureHandle, MediaError> {
        let (ready_tx, ready_rx) = std_mpsc::sync_channel(1);
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let (frame_tx, frame_rx) = mpsc::channel(FRAME_QUEUE);

        let worker = thread::Builder::new()
            .name("microphone-capture".into())
            .spawn(move || {
                let stream = match open_input(frame_tx) {
                    Ok(s) => {
                        let _ = ready_tx.send(Ok(()));
                        s
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                info!("Microphone opened");
                // отправитель уходит вместе с handle
                let _ = stop_rx.recv();
                drop(stream);
                info!("Microphone closed");
            })
            .map_err(|e| unavailable("audio", e))?;

        let worker = wait_ready("audio", ready_rx, worker)?;
        Ok(CaptureHandle::new("microphone", frame_rx, move || {
            let _ = stop_tx.send(());
            let _ = worker.join();
        }))
    }
}
