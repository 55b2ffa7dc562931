//! Audio device I/O via cpal.
//!
//! # Design constraints
//!
//! Both cpal callbacks (input and output) run on OS audio threads at elevated
//! priority. They **must not**:
//! - Allocate heap memory (beyond the first-callback scratch growth)
//! - Block on a mutex or condvar
//! - Perform I/O
//!
//! Both directions therefore talk to the workers exclusively through SPSC
//! ring buffers whose `push_slice`/`pop_slice` are lock-free.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms (COM on Windows, CoreAudio on
//! macOS). `AudioCapture` and `AudioPlayback` must each be created and
//! dropped on the same thread; the pipeline opens them inside the owning
//! worker's `spawn_blocking` closure.

pub mod device;
pub mod playback;
pub mod resample;

#[cfg(feature = "audio-cpal")]
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    SampleFormat, SampleRate, Stream, StreamConfig,
};

use crate::{
    buffering::{CaptureProducer, Producer},
    error::{Result, TraduxError},
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
#[cfg(feature = "audio-cpal")]
use tracing::{error, info, warn};

/// Handle to an active input capture stream.
///
/// **Not `Send`** — bound to its creation thread.
pub struct AudioCapture {
    /// Kept alive so the stream is not dropped prematurely.
    #[cfg(feature = "audio-cpal")]
    _stream: Stream,
    running: Arc<AtomicBool>,
    /// Actual capture sample rate reported by the device (Hz).
    pub sample_rate: u32,
}

#[cfg(feature = "audio-cpal")]
fn resolve_input_device(preferred: Option<&str>) -> Result<cpal::Device> {
    let host = cpal::default_host();

    if let Some(name) = preferred {
        match host.input_devices() {
            Ok(mut devices) => {
                if let Some(device) =
                    devices.find(|d| d.name().map(|n| n == name).unwrap_or(false))
                {
                    return Ok(device);
                }
                warn!("preferred input device '{name}' not found, falling back");
            }
            Err(e) => warn!("failed to list input devices: {e}"),
        }
    }

    host.default_input_device()
        .ok_or(TraduxError::NoDefaultInputDevice)
}

/// Downmix an interleaved block to mono into `mono`, converting with `to_f32`.
#[cfg(feature = "audio-cpal")]
fn downmix_into<T: Copy>(data: &[T], channels: usize, mono: &mut Vec<f32>, to_f32: impl Fn(T) -> f32) {
    let frames = data.len() / channels;
    mono.resize(frames, 0.0);
    if channels == 1 {
        for (out, sample) in mono.iter_mut().zip(data.iter()) {
            *out = to_f32(*sample);
        }
        return;
    }
    for (f, out) in mono.iter_mut().enumerate() {
        let base = f * channels;
        let mut sum = 0f32;
        for c in 0..channels {
            sum += to_f32(data[base + c]);
        }
        *out = sum / channels as f32;
    }
}

impl AudioCapture {
    /// Open an input device (preferred name or system default) and push mono
    /// f32 PCM into `producer`.
    ///
    /// Must be called from the thread that will also drop this value.
    ///
    /// # Errors
    /// `TraduxError::NoDefaultInputDevice` when no microphone is available,
    /// `TraduxError::AudioStream` if cpal fails to build or start the stream.
    #[cfg(feature = "audio-cpal")]
    pub fn open(
        mut producer: CaptureProducer,
        running: Arc<AtomicBool>,
        preferred_device_name: Option<&str>,
    ) -> Result<Self> {
        let device = resolve_input_device(preferred_device_name)?;

        info!(
            device = device.name().unwrap_or_default().as_str(),
            "opening input device"
        );

        let supported = device
            .default_input_config()
            .map_err(|e| TraduxError::AudioDevice(e.to_string()))?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels() as usize;

        info!(sample_rate, channels, "capture config selected");

        let config = StreamConfig {
            channels: channels as u16,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let running_cb = Arc::clone(&running);
        let mut mono: Vec<f32> = Vec::new();
        let err_fn = |err| error!("capture stream error: {err}");

        let stream = match supported.sample_format() {
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _info| {
                    if !running_cb.load(Ordering::Relaxed) {
                        return;
                    }
                    downmix_into(data, channels, &mut mono, |s| s);
                    let written = producer.push_slice(&mono);
                    if written < mono.len() {
                        warn!("capture ring full: dropped {} frames", mono.len() - written);
                    }
                },
                err_fn,
                None,
            ),
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _info| {
                    if !running_cb.load(Ordering::Relaxed) {
                        return;
                    }
                    downmix_into(data, channels, &mut mono, |s| s as f32 / 32_768.0);
                    let written = producer.push_slice(&mono);
                    if written < mono.len() {
                        warn!("capture ring full: dropped {} frames", mono.len() - written);
                    }
                },
                err_fn,
                None,
            ),
            SampleFormat::U16 => device.build_input_stream(
                &config,
                move |data: &[u16], _info| {
                    if !running_cb.load(Ordering::Relaxed) {
                        return;
                    }
                    downmix_into(data, channels, &mut mono, |s| {
                        (s as f32 - 32_768.0) / 32_768.0
                    });
                    let written = producer.push_slice(&mono);
                    if written < mono.len() {
                        warn!("capture ring full: dropped {} frames", mono.len() - written);
                    }
                },
                err_fn,
                None,
            ),
            fmt => {
                return Err(TraduxError::AudioStream(format!(
                    "unsupported capture sample format: {fmt:?}"
                )))
            }
        }
        .map_err(|e| TraduxError::AudioStream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| TraduxError::AudioStream(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            running,
            sample_rate,
        })
    }

    /// Stop: signal the callback to no-op on its next invocation.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Stub when the `audio-cpal` feature is disabled.
#[cfg(not(feature = "audio-cpal"))]
impl AudioCapture {
    pub fn open(
        _producer: CaptureProducer,
        _running: Arc<AtomicBool>,
        _preferred_device_name: Option<&str>,
    ) -> Result<Self> {
        Err(TraduxError::AudioStream(
            "compiled without audio-cpal feature".into(),
        ))
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}
