//! Capture & activity-gate worker.
//!
//! ## Per iteration
//!
//! ```text
//! 1. Drain the capture ring → raw samples at the device rate
//! 2. Resample to the pipeline rate
//! 3. Append to the rolling diagnostic ring (independent of the gate)
//! 4. Slice fixed-duration AudioFrames
//! 5. Gate each frame: Speaking / trailing grace → forward, else drop
//! ```
//!
//! Device errors are fatal to this worker only: the cpal callback logs them
//! and this loop simply stops seeing samples; downstream workers observe a
//! drained queue, not an error.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::{
    audio::resample::RateConverter,
    buffering::{frame::AudioFrame, queue::QueueSender, CaptureConsumer, Consumer},
    events::ActivityEvent,
    gate::{ActivityGate, ActivityState},
    pipeline::{PipelineConfig, PipelineShared},
};

/// Samples drained from the capture ring per iteration.
/// 20 ms at 48 kHz; a reasonable stride for most capture rates.
const DRAIN_CHUNK: usize = 960;

/// Sleep when the ring is empty (avoids busy-wait burning a core).
const SLEEP_EMPTY_MS: u64 = 5;

pub struct CaptureContext {
    pub config: PipelineConfig,
    pub consumer: CaptureConsumer,
    pub capture_sample_rate: u32,
    pub frame_tx: QueueSender<AudioFrame>,
    pub running: Arc<AtomicBool>,
    pub shared: Arc<PipelineShared>,
    pub activity_tx: broadcast::Sender<ActivityEvent>,
}

/// Run the capture worker until `ctx.running` becomes false.
pub fn run(mut ctx: CaptureContext) {
    info!("capture worker started");

    let mut resampler = match RateConverter::new(
        ctx.capture_sample_rate,
        ctx.config.pipeline_sample_rate,
        DRAIN_CHUNK,
    ) {
        Ok(r) => r,
        Err(e) => {
            error!("failed to create capture resampler: {e}");
            return;
        }
    };

    let frame_len = ctx.config.frame_len();
    let ring_len = ctx.config.diagnostic_ring_len();
    let mut gate = ActivityGate::new(ctx.config.silence_threshold, ctx.config.silence_duration);

    // Scratch buffer reused each iteration.
    let mut raw = vec![0f32; DRAIN_CHUNK];
    // Pipeline-rate samples awaiting frame assembly.
    let mut pending: Vec<f32> = Vec::with_capacity(frame_len * 2);
    let mut activity_seq = 0u64;

    loop {
        if !ctx.running.load(Ordering::Relaxed) {
            break;
        }

        let n = ctx.consumer.pop_slice(&mut raw);
        if n == 0 {
            std::thread::sleep(std::time::Duration::from_millis(SLEEP_EMPTY_MS));
            continue;
        }

        let resampled = resampler.process(&raw[..n]);
        if resampled.is_empty() {
            // Partial chunk — the resampler is waiting for a full block.
            continue;
        }

        // The diagnostic ring sees everything, gated or not.
        ctx.shared.append_recent(&resampled, ring_len);
        pending.extend_from_slice(&resampled);

        while pending.len() >= frame_len {
            let samples: Vec<f32> = pending.drain(..frame_len).collect();
            let frame = AudioFrame::new(samples, ctx.config.pipeline_sample_rate);
            let peak = frame.peak();

            let decision = gate.observe(&frame);
            let speaking = decision.state == ActivityState::Speaking;
            ctx.shared.speaking.store(speaking, Ordering::Relaxed);
            ctx.shared
                .diagnostics
                .frames_in
                .fetch_add(1, Ordering::Relaxed);

            let _ = ctx.activity_tx.send(ActivityEvent {
                seq: activity_seq,
                peak,
                is_speech: speaking,
            });
            activity_seq = activity_seq.saturating_add(1);

            // Log the level periodically for diagnostics.
            if activity_seq % 50 == 0 {
                debug!(
                    peak = format_args!("{:.4}", peak),
                    speaking,
                    forward = decision.forward,
                    "audio level check"
                );
            }

            if decision.forward && ctx.frame_tx.push(frame) {
                ctx.shared
                    .diagnostics
                    .frames_forwarded
                    .fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    ctx.shared.speaking.store(false, Ordering::Relaxed);
    info!("capture worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::buffering::{create_capture_ring, queue, queue::FullPolicy, Producer};

    fn ctx_with_ring(
        producer_samples: &[f32],
    ) -> (
        CaptureContext,
        crate::buffering::queue::QueueReceiver<AudioFrame>,
        Arc<AtomicBool>,
    ) {
        let (mut producer, consumer) = create_capture_ring();
        producer.push_slice(producer_samples);

        let (frame_tx, frame_rx) = queue::channel(64, FullPolicy::DropNewest);
        let (activity_tx, _) = broadcast::channel(256);
        let running = Arc::new(AtomicBool::new(true));

        let ctx = CaptureContext {
            config: PipelineConfig::default(),
            consumer,
            capture_sample_rate: 16_000,
            frame_tx,
            running: Arc::clone(&running),
            shared: Arc::new(PipelineShared::default()),
            activity_tx,
        };
        (ctx, frame_rx, running)
    }

    #[test]
    fn loud_audio_is_framed_and_forwarded() {
        // 0.2 s of loud audio at the pipeline rate → two 100 ms frames.
        let (ctx, frame_rx, running) = ctx_with_ring(&vec![0.5; 3_200]);
        let shared = Arc::clone(&ctx.shared);

        let handle = std::thread::spawn(move || run(ctx));
        let first = frame_rx
            .recv_timeout(Duration::from_secs(1))
            .expect("first frame");
        let second = frame_rx
            .recv_timeout(Duration::from_secs(1))
            .expect("second frame");
        running.store(false, Ordering::SeqCst);
        handle.join().expect("capture worker panicked");

        assert_eq!(first.samples.len(), 1_600);
        assert_eq!(second.samples.len(), 1_600);
        assert!(shared.diagnostics.snapshot().frames_forwarded >= 2);
    }

    #[test]
    fn silent_audio_is_not_forwarded_but_reaches_the_ring() {
        let (ctx, frame_rx, running) = ctx_with_ring(&vec![0.0; 3_200]);
        let shared = Arc::clone(&ctx.shared);

        let handle = std::thread::spawn(move || run(ctx));
        std::thread::sleep(Duration::from_millis(50));
        running.store(false, Ordering::SeqCst);
        handle.join().expect("capture worker panicked");

        assert!(frame_rx.try_recv().is_none());
        let snap = shared.diagnostics.snapshot();
        assert_eq!(snap.frames_forwarded, 0);
        assert_eq!(snap.frames_in, 2);
        // The diagnostic ring saw the silent audio anyway.
        assert_eq!(shared.recent_audio.lock().len(), 3_200);
    }

    #[test]
    fn speaking_flag_tracks_gate_state() {
        let (ctx, _frame_rx, running) = ctx_with_ring(&vec![0.5; 1_600]);
        let shared = Arc::clone(&ctx.shared);

        let handle = std::thread::spawn(move || run(ctx));
        std::thread::sleep(Duration::from_millis(50));
        assert!(shared.speaking.load(Ordering::Relaxed));
        running.store(false, Ordering::SeqCst);
        handle.join().expect("capture worker panicked");
        // Cleared on exit.
        assert!(!shared.speaking.load(Ordering::Relaxed));
    }
}
