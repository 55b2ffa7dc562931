//! Audio playback via cpal — the capture module's mirror image.
//!
//! The output callback pulls mono f32 samples from the playback SPSC ring,
//! fans them out to the device's channel count and zero-fills on underrun.
//! The playback worker owns the producer half and blocks only on ring
//! availability, never inside the callback.

#[cfg(feature = "audio-cpal")]
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    SampleFormat, SampleRate, Stream, StreamConfig,
};

use crate::{
    buffering::{Consumer, PlaybackConsumer},
    error::{Result, TraduxError},
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
#[cfg(feature = "audio-cpal")]
use tracing::{error, info, warn};

/// Handle to an active output stream.
///
/// **Not `Send`** — bound to its creation thread, exactly like capture.
pub struct AudioPlayback {
    #[cfg(feature = "audio-cpal")]
    _stream: Stream,
    running: Arc<AtomicBool>,
    /// Actual playback sample rate reported by the device (Hz).
    pub sample_rate: u32,
}

#[cfg(feature = "audio-cpal")]
fn resolve_output_device(preferred: Option<&str>) -> Result<cpal::Device> {
    let host = cpal::default_host();

    if let Some(name) = preferred {
        match host.output_devices() {
            Ok(mut devices) => {
                if let Some(device) =
                    devices.find(|d| d.name().map(|n| n == name).unwrap_or(false))
                {
                    return Ok(device);
                }
                warn!("preferred output device '{name}' not found, falling back");
            }
            Err(e) => warn!("failed to list output devices: {e}"),
        }
    }

    host.default_output_device()
        .ok_or(TraduxError::NoDefaultOutputDevice)
}

/// Fill an interleaved output block from `mono`, duplicating across channels.
/// `mono` holds `data.len() / channels` fresh samples; missing samples are
/// already zeroed by the caller.
#[cfg(feature = "audio-cpal")]
fn fan_out<T>(data: &mut [T], channels: usize, mono: &[f32], from_f32: impl Fn(f32) -> T) {
    for (f, sample) in mono.iter().enumerate() {
        let base = f * channels;
        for c in 0..channels {
            data[base + c] = from_f32(*sample);
        }
    }
}

impl AudioPlayback {
    /// Open an output device (preferred name or system default) and drain
    /// mono f32 PCM from `consumer`.
    ///
    /// Must be called from the thread that will also drop this value.
    ///
    /// # Errors
    /// `TraduxError::NoDefaultOutputDevice` when no speaker is available,
    /// `TraduxError::AudioStream` if cpal fails to build or start the stream.
    #[cfg(feature = "audio-cpal")]
    pub fn open(
        mut consumer: PlaybackConsumer,
        running: Arc<AtomicBool>,
        preferred_device_name: Option<&str>,
    ) -> Result<Self> {
        let device = resolve_output_device(preferred_device_name)?;

        info!(
            device = device.name().unwrap_or_default().as_str(),
            "opening output device"
        );

        let supported = device
            .default_output_config()
            .map_err(|e| TraduxError::AudioDevice(e.to_string()))?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels() as usize;

        info!(sample_rate, channels, "playback config selected");

        let config = StreamConfig {
            channels: channels as u16,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let running_cb = Arc::clone(&running);
        let mut mono: Vec<f32> = Vec::new();
        let err_fn = |err| error!("playback stream error: {err}");

        let stream = match supported.sample_format() {
            SampleFormat::F32 => device.build_output_stream(
                &config,
                move |data: &mut [f32], _info| {
                    let frames = data.len() / channels;
                    mono.resize(frames, 0.0);
                    mono.fill(0.0);
                    if running_cb.load(Ordering::Relaxed) {
                        consumer.pop_slice(&mut mono);
                    }
                    fan_out(data, channels, &mono, |s| s);
                },
                err_fn,
                None,
            ),
            SampleFormat::I16 => device.build_output_stream(
                &config,
                move |data: &mut [i16], _info| {
                    let frames = data.len() / channels;
                    mono.resize(frames, 0.0);
                    mono.fill(0.0);
                    if running_cb.load(Ordering::Relaxed) {
                        consumer.pop_slice(&mut mono);
                    }
                    fan_out(data, channels, &mono, |s| {
                        (s.clamp(-1.0, 1.0) * 32_767.0) as i16
                    });
                },
                err_fn,
                None,
            ),
            SampleFormat::U16 => device.build_output_stream(
                &config,
                move |data: &mut [u16], _info| {
                    let frames = data.len() / channels;
                    mono.resize(frames, 0.0);
                    mono.fill(0.0);
                    if running_cb.load(Ordering::Relaxed) {
                        consumer.pop_slice(&mut mono);
                    }
                    fan_out(data, channels, &mono, |s| {
                        ((s.clamp(-1.0, 1.0) * 32_767.0) + 32_768.0) as u16
                    });
                },
                err_fn,
                None,
            ),
            fmt => {
                return Err(TraduxError::AudioStream(format!(
                    "unsupported playback sample format: {fmt:?}"
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

    /// Stop: the callback emits silence from its next invocation.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Stub when the `audio-cpal` feature is disabled.
#[cfg(not(feature = "audio-cpal"))]
impl AudioPlayback {
    pub fn open(
        _consumer: PlaybackConsumer,
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
