//! Playback worker — owns the output audio device.
//!
//! Drains synthesized waveforms, converts them from the synthesis rate to
//! the device rate and feeds the playback ring, blocking only on ring
//! (device buffer) availability. An unavailable output device disables this
//! stage with a warning; the text path keeps running.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use tracing::{info, warn};

use crate::{
    audio::{playback::AudioPlayback, resample::RateConverter},
    buffering::{create_playback_ring, queue::QueueReceiver, Producer},
};

/// Sleep while the playback ring is full (device draining).
const SLEEP_FULL_MS: u64 = 5;

/// Input block size for the synthesis→device rate converter.
const CONVERT_BLOCK: usize = 1_024;

pub struct PlaybackContext {
    pub wave_rx: QueueReceiver<Vec<f32>>,
    pub synthesis_sample_rate: u32,
    pub preferred_output_device: Option<String>,
    pub running: Arc<AtomicBool>,
    pub queue_poll: Duration,
}

/// Run the playback worker until `ctx.running` becomes false.
///
/// The cpal output stream is created here, on this thread, and dropped here
/// — it never crosses a thread boundary.
pub fn run(ctx: PlaybackContext) {
    let (mut producer, consumer) = create_playback_ring();

    let playback = match AudioPlayback::open(
        consumer,
        Arc::clone(&ctx.running),
        ctx.preferred_output_device.as_deref(),
    ) {
        Ok(p) => p,
        Err(e) => {
            // Stage-local failure: translation text keeps flowing, spoken
            // output is disabled for this session.
            warn!("output device unavailable — playback disabled: {e}");
            return;
        }
    };

    let mut converter = match RateConverter::new(
        ctx.synthesis_sample_rate,
        playback.sample_rate,
        CONVERT_BLOCK,
    ) {
        Ok(c) => c,
        Err(e) => {
            warn!("playback resampler init failed — playback disabled: {e}");
            return;
        }
    };

    info!(
        synthesis_rate = ctx.synthesis_sample_rate,
        device_rate = playback.sample_rate,
        "playback worker started"
    );

    loop {
        if !ctx.running.load(Ordering::Relaxed) {
            break;
        }

        let waveform = match ctx.wave_rx.recv_timeout(ctx.queue_poll) {
            Ok(w) => w,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                std::thread::sleep(ctx.queue_poll);
                continue;
            }
        };

        let out = converter.process(&waveform);

        // Feed the ring, blocking only on device buffer availability. The
        // running flag is rechecked so shutdown isn't held up by a long
        // utterance.
        let mut offset = 0;
        while offset < out.len() {
            if !ctx.running.load(Ordering::Relaxed) {
                break;
            }
            let written = producer.push_slice(&out[offset..]);
            offset += written;
            if written == 0 {
                std::thread::sleep(Duration::from_millis(SLEEP_FULL_MS));
            }
        }
    }

    // Stream drops here, releasing the output device on this thread.
    drop(playback);
    info!("playback worker stopped");
}
