//! `TraduxEngine` — top-level lifecycle controller.
//!
//! ## Lifecycle
//!
//! ```text
//! TraduxEngine::new()
//!     └─► start()    → devices open, four workers + poll task spawned,
//!     │                warm-up task signals the readiness latch,
//!     │                status = WarmingUp → Listening
//!     └─► stop()     → running=false, every worker exits within one
//!                      queue-timeout interval, streams dropped, status = Stopped
//! ```
//!
//! `start()`/`stop()` are idempotent: calling them in the wrong state returns
//! an error rather than panicking.
//!
//! ## Threading
//!
//! `cpal::Stream` is `!Send` on Windows/macOS (COM / CoreAudio thread
//! affinity). The capture and playback streams are therefore each created
//! *inside* their worker's `spawn_blocking` closure and never cross a thread
//! boundary. A sync oneshot channel propagates input-device open errors back
//! to the `start()` caller.

pub mod capture;
pub mod dispatch;
pub mod playback;
pub mod speak;

use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::{
    audio::AudioCapture,
    buffering::{
        create_capture_ring,
        queue::{self, FullPolicy},
    },
    engines::EngineSet,
    error::{Result, TraduxError},
    events::{
        ActivityEvent, DisplayUpdate, PipelineStatus, PipelineStatusEvent, TranslationPair,
    },
};

/// Broadcast channel capacity for display/status/activity subscribers.
const BROADCAST_CAP: usize = 256;

/// Configuration for `TraduxEngine`.
///
/// Language codes and the silence threshold come from process configuration
/// at startup and are immutable afterwards; the remaining fields are pacing
/// tunables with workable defaults.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Source-language code handed to the transcriber (e.g. "en").
    pub source_language: String,
    /// Target-language code handed to the translator (e.g. "fr").
    pub target_language: String,
    /// Rate all pipeline-internal audio is converted to (Hz). Default: 16000.
    pub pipeline_sample_rate: u32,
    /// Fixed duration of one capture frame. Default: 100 ms.
    pub frame_duration: Duration,
    /// Peak amplitude above which a frame counts as speech. Default: 0.01.
    pub silence_threshold: f32,
    /// Continuous silence required to leave the Speaking state. Default: 500 ms.
    pub silence_duration: Duration,
    /// Accumulated audio required before a dispatch cycle. Default: 1 s.
    pub min_process_duration: Duration,
    /// Accumulation cap; reaching it truncates to the overlap. Default: 5 s.
    pub max_buffer_duration: Duration,
    /// Tail retained across processing windows. Default: 200 ms.
    pub overlap_duration: Duration,
    /// Minimum interval between published translations. Default: 500 ms.
    pub translation_debounce: Duration,
    /// Idle time after which a non-empty buffer is flushed anyway. Default: 1 s.
    pub forced_flush_after: Duration,
    /// Bounded receive timeout for every worker queue. Default: 100 ms.
    pub queue_poll: Duration,
    /// Presentation poll cadence. Default: 50 ms.
    pub display_poll: Duration,
    /// How long workers wait on the readiness latch before proceeding
    /// anyway. Default: 30 s.
    pub warmup_timeout: Duration,
    /// Length of the rolling raw-audio diagnostic ring. Default: 3 s.
    pub diagnostic_ring: Duration,
    /// Gated-frame queue capacity (drop-newest). Default: 64.
    pub frame_queue_capacity: usize,
    /// Presentation-pair queue capacity (drop-oldest). Default: 16.
    pub pair_queue_capacity: usize,
    /// Synthesis-text queue capacity (drop-newest). Default: 8.
    pub synthesis_queue_capacity: usize,
    /// Playback-waveform queue capacity (drop-newest). Default: 4.
    pub playback_queue_capacity: usize,
    /// Input device name override. `None` selects the system default.
    pub preferred_input_device: Option<String>,
    /// Output device name override. `None` selects the system default.
    pub preferred_output_device: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_language: "en".into(),
            target_language: "fr".into(),
            pipeline_sample_rate: 16_000,
            frame_duration: Duration::from_millis(100),
            silence_threshold: 0.01,
            silence_duration: Duration::from_millis(500),
            min_process_duration: Duration::from_secs(1),
            max_buffer_duration: Duration::from_secs(5),
            overlap_duration: Duration::from_millis(200),
            translation_debounce: Duration::from_millis(500),
            forced_flush_after: Duration::from_secs(1),
            queue_poll: Duration::from_millis(100),
            display_poll: Duration::from_millis(50),
            warmup_timeout: Duration::from_secs(30),
            diagnostic_ring: Duration::from_secs(3),
            frame_queue_capacity: 64,
            pair_queue_capacity: 16,
            synthesis_queue_capacity: 8,
            playback_queue_capacity: 4,
            preferred_input_device: None,
            preferred_output_device: None,
        }
    }
}

impl PipelineConfig {
    /// Samples per capture frame at the pipeline rate.
    pub fn frame_len(&self) -> usize {
        (self.frame_duration.as_secs_f64() * self.pipeline_sample_rate as f64) as usize
    }

    /// Samples held by the diagnostic ring.
    pub fn diagnostic_ring_len(&self) -> usize {
        (self.diagnostic_ring.as_secs_f64() * self.pipeline_sample_rate as f64) as usize
    }
}

/// Pipeline counters, written with relaxed atomics from the workers.
pub struct PipelineDiagnostics {
    pub frames_in: AtomicUsize,
    pub frames_forwarded: AtomicUsize,
    pub dispatch_cycles: AtomicUsize,
    pub forced_flushes: AtomicUsize,
    pub silence_skips: AtomicUsize,
    pub transcriptions: AtomicUsize,
    pub empty_transcriptions: AtomicUsize,
    pub translations: AtomicUsize,
    pub translations_debounced: AtomicUsize,
    pub pairs_published: AtomicUsize,
    pub synthesis_requests: AtomicUsize,
    pub dedup_skips: AtomicUsize,
    pub engine_errors: AtomicUsize,
}

impl Default for PipelineDiagnostics {
    fn default() -> Self {
        Self {
            frames_in: AtomicUsize::new(0),
            frames_forwarded: AtomicUsize::new(0),
            dispatch_cycles: AtomicUsize::new(0),
            forced_flushes: AtomicUsize::new(0),
            silence_skips: AtomicUsize::new(0),
            transcriptions: AtomicUsize::new(0),
            empty_transcriptions: AtomicUsize::new(0),
            translations: AtomicUsize::new(0),
            translations_debounced: AtomicUsize::new(0),
            pairs_published: AtomicUsize::new(0),
            synthesis_requests: AtomicUsize::new(0),
            dedup_skips: AtomicUsize::new(0),
            engine_errors: AtomicUsize::new(0),
        }
    }
}

impl PipelineDiagnostics {
    pub fn reset(&self) {
        self.frames_in.store(0, Ordering::Relaxed);
        self.frames_forwarded.store(0, Ordering::Relaxed);
        self.dispatch_cycles.store(0, Ordering::Relaxed);
        self.forced_flushes.store(0, Ordering::Relaxed);
        self.silence_skips.store(0, Ordering::Relaxed);
        self.transcriptions.store(0, Ordering::Relaxed);
        self.empty_transcriptions.store(0, Ordering::Relaxed);
        self.translations.store(0, Ordering::Relaxed);
        self.translations_debounced.store(0, Ordering::Relaxed);
        self.pairs_published.store(0, Ordering::Relaxed);
        self.synthesis_requests.store(0, Ordering::Relaxed);
        self.dedup_skips.store(0, Ordering::Relaxed);
        self.engine_errors.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            frames_in: self.frames_in.load(Ordering::Relaxed),
            frames_forwarded: self.frames_forwarded.load(Ordering::Relaxed),
            dispatch_cycles: self.dispatch_cycles.load(Ordering::Relaxed),
            forced_flushes: self.forced_flushes.load(Ordering::Relaxed),
            silence_skips: self.silence_skips.load(Ordering::Relaxed),
            transcriptions: self.transcriptions.load(Ordering::Relaxed),
            empty_transcriptions: self.empty_transcriptions.load(Ordering::Relaxed),
            translations: self.translations.load(Ordering::Relaxed),
            translations_debounced: self.translations_debounced.load(Ordering::Relaxed),
            pairs_published: self.pairs_published.load(Ordering::Relaxed),
            synthesis_requests: self.synthesis_requests.load(Ordering::Relaxed),
            dedup_skips: self.dedup_skips.load(Ordering::Relaxed),
            engine_errors: self.engine_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DiagnosticsSnapshot {
    pub frames_in: usize,
    pub frames_forwarded: usize,
    pub dispatch_cycles: usize,
    pub forced_flushes: usize,
    pub silence_skips: usize,
    pub transcriptions: usize,
    pub empty_transcriptions: usize,
    pub translations: usize,
    pub translations_debounced: usize,
    pub pairs_published: usize,
    pub synthesis_requests: usize,
    pub dedup_skips: usize,
    pub engine_errors: usize,
}

/// Cross-stage shared context. Each field has exactly one writer:
///
/// | field                   | writer   |
/// |-------------------------|----------|
/// | `speaking`              | capture  |
/// | `recent_audio`          | capture  |
/// | `current_transcription` | dispatch |
/// | `last_latency`          | dispatch |
///
/// Everything else a stage touches is owned by that stage alone; the queues
/// provide the only other synchronization in the system.
pub struct PipelineShared {
    pub speaking: AtomicBool,
    pub recent_audio: Mutex<Vec<f32>>,
    pub current_transcription: Mutex<String>,
    pub last_latency: Mutex<Option<Duration>>,
    pub diagnostics: PipelineDiagnostics,
}

impl Default for PipelineShared {
    fn default() -> Self {
        Self {
            speaking: AtomicBool::new(false),
            recent_audio: Mutex::new(Vec::new()),
            current_transcription: Mutex::new(String::new()),
            last_latency: Mutex::new(None),
            diagnostics: PipelineDiagnostics::default(),
        }
    }
}

impl PipelineShared {
    /// Append to the rolling diagnostic ring, keeping at most `max_len`
    /// trailing samples.
    pub fn append_recent(&self, samples: &[f32], max_len: usize) {
        if max_len == 0 || samples.is_empty() {
            return;
        }
        let mut buf = self.recent_audio.lock();
        if samples.len() >= max_len {
            buf.clear();
            buf.extend_from_slice(&samples[samples.len() - max_len..]);
            return;
        }
        let needed = buf.len().saturating_add(samples.len());
        if needed > max_len {
            let drop = needed - max_len;
            buf.drain(..drop);
        }
        buf.extend_from_slice(samples);
    }
}

/// One-time readiness latch gating the model-calling workers on warm-up.
///
/// Signalled on warm-up success *and* failure so nobody blocks forever;
/// waiters that time out proceed and treat model failures as per-cycle
/// errors.
#[derive(Clone, Default)]
pub struct Readiness {
    inner: Arc<ReadinessInner>,
}

#[derive(Default)]
struct ReadinessInner {
    state: Mutex<Option<bool>>,
    cond: Condvar,
}

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the warm-up outcome and wake all waiters.
    pub fn signal(&self, ok: bool) {
        *self.inner.state.lock() = Some(ok);
        self.inner.cond.notify_all();
    }

    /// Wait for the outcome. `None` means the timeout elapsed first.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<bool> {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        loop {
            if let Some(ok) = *state {
                return Some(ok);
            }
            if self.inner.cond.wait_until(&mut state, deadline).timed_out() {
                return *state;
            }
        }
    }
}

/// The top-level engine handle.
///
/// `TraduxEngine` is `Send + Sync` — all fields use interior mutability.
/// Wrap in `Arc<TraduxEngine>` to share between a front end and
/// event-forwarding tasks.
pub struct TraduxEngine {
    config: PipelineConfig,
    engines: EngineSet,
    /// `true` while the workers are active. The sole cancellation signal.
    running: Arc<AtomicBool>,
    /// Canonical status (written via Mutex, read from commands).
    status: Arc<Mutex<PipelineStatus>>,
    display_tx: broadcast::Sender<DisplayUpdate>,
    status_tx: broadcast::Sender<PipelineStatusEvent>,
    activity_tx: broadcast::Sender<ActivityEvent>,
    /// Monotonically increasing display-update sequence counter.
    seq: Arc<AtomicU64>,
    shared: Arc<PipelineShared>,
}

impl TraduxEngine {
    /// Create a new engine. Does not open devices — call `start()`.
    pub fn new(config: PipelineConfig, engines: EngineSet) -> Self {
        let (display_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (activity_tx, _) = broadcast::channel(BROADCAST_CAP);

        Self {
            config,
            engines,
            running: Arc::new(AtomicBool::new(false)),
            status: Arc::new(Mutex::new(PipelineStatus::Idle)),
            display_tx,
            status_tx,
            activity_tx,
            seq: Arc::new(AtomicU64::new(0)),
            shared: Arc::new(PipelineShared::default()),
        }
    }

    /// Start the four workers, the warm-up task and the presentation poll.
    ///
    /// Blocks until the input device is confirmed open (or fails), then
    /// returns; the pipeline continues in background blocking tasks. Must be
    /// called from within a tokio runtime.
    ///
    /// # Errors
    /// - `TraduxError::AlreadyRunning` if already started.
    /// - `TraduxError::NoDefaultInputDevice` / `TraduxError::AudioStream` on
    ///   input-device errors. The output device is opened by the playback
    ///   worker; its failure disables playback only and is surfaced as a
    ///   warning, not an error.
    pub fn start(&self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Err(TraduxError::AlreadyRunning);
        }

        self.shared.diagnostics.reset();
        self.running.store(true, Ordering::SeqCst);

        let (frame_tx, frame_rx) =
            queue::channel(self.config.frame_queue_capacity, FullPolicy::DropNewest);
        let (pair_tx, pair_rx) =
            queue::channel(self.config.pair_queue_capacity, FullPolicy::DropOldest);
        let (synth_tx, synth_rx) =
            queue::channel(self.config.synthesis_queue_capacity, FullPolicy::DropNewest);
        let (wave_tx, wave_rx) =
            queue::channel(self.config.playback_queue_capacity, FullPolicy::DropNewest);

        let readiness = Readiness::new();

        // Read before warm-up starts so a slow warm-up holding the
        // synthesizer lock cannot stall start().
        let synthesis_sample_rate = self.engines.synthesizer.0.lock().sample_rate();

        // ── Warm-up task: signals the readiness latch either way ──────────
        self.set_status(PipelineStatus::WarmingUp, None);
        {
            let engines = self.engines.clone();
            let readiness = readiness.clone();
            let status = Arc::clone(&self.status);
            let status_tx = self.status_tx.clone();
            tokio::task::spawn_blocking(move || {
                let outcome = engines.warm_up();
                let (ok, detail) = match outcome {
                    Ok(()) => {
                        info!("collaborators warmed up");
                        (true, None)
                    }
                    Err(e) => {
                        warn!("collaborator warm-up failed: {e}");
                        (false, Some(format!("warm-up failed: {e}")))
                    }
                };
                readiness.signal(ok);
                *status.lock() = PipelineStatus::Listening;
                let _ = status_tx.send(PipelineStatusEvent {
                    status: PipelineStatus::Listening,
                    detail,
                });
            });
        }

        // ── Capture worker (owns the input device) ────────────────────────
        // Sync oneshot: the worker confirms device open success/failure to
        // start(), carrying the actual capture sample rate on success.
        let (open_tx, open_rx) = std::sync::mpsc::channel::<Result<u32>>();
        {
            let config = self.config.clone();
            let running = Arc::clone(&self.running);
            let shared = Arc::clone(&self.shared);
            let activity_tx = self.activity_tx.clone();
            tokio::task::spawn_blocking(move || {
                let (producer, consumer) = create_capture_ring();
                let capture = match AudioCapture::open(
                    producer,
                    Arc::clone(&running),
                    config.preferred_input_device.as_deref(),
                ) {
                    Ok(c) => {
                        let _ = open_tx.send(Ok(c.sample_rate));
                        c
                    }
                    Err(e) => {
                        let _ = open_tx.send(Err(e));
                        running.store(false, Ordering::SeqCst);
                        return;
                    }
                };

                capture::run(capture::CaptureContext {
                    config,
                    consumer,
                    capture_sample_rate: capture.sample_rate,
                    frame_tx,
                    running,
                    shared,
                    activity_tx,
                });

                // Stream drops here, releasing the input device on this thread.
                drop(capture);
            });
        }

        match open_rx.recv() {
            Ok(Ok(_rate)) => {}
            Ok(Err(e)) => {
                self.running.store(false, Ordering::SeqCst);
                self.set_status(PipelineStatus::Error, Some(e.to_string()));
                return Err(e);
            }
            Err(_) => {
                self.running.store(false, Ordering::SeqCst);
                self.set_status(PipelineStatus::Error, Some("capture failed to start".into()));
                return Err(TraduxError::Other(anyhow::anyhow!(
                    "capture task died unexpectedly"
                )));
            }
        }

        // ── Dispatch worker ───────────────────────────────────────────────
        {
            let ctx = dispatch::DispatchContext {
                config: self.config.clone(),
                frame_rx,
                pair_tx,
                synth_tx,
                transcriber: self.engines.transcriber.clone(),
                translator: self.engines.translator.clone(),
                running: Arc::clone(&self.running),
                shared: Arc::clone(&self.shared),
                readiness: readiness.clone(),
            };
            tokio::task::spawn_blocking(move || dispatch::run(ctx));
        }

        // ── Sentence gate & synthesis worker ──────────────────────────────
        {
            let ctx = speak::SpeakContext {
                synth_rx,
                wave_tx,
                synthesizer: self.engines.synthesizer.clone(),
                running: Arc::clone(&self.running),
                shared: Arc::clone(&self.shared),
                queue_poll: self.config.queue_poll,
                readiness,
            };
            tokio::task::spawn_blocking(move || speak::run(ctx));
        }

        // ── Playback worker (owns the output device) ──────────────────────
        {
            let ctx = playback::PlaybackContext {
                wave_rx,
                synthesis_sample_rate,
                preferred_output_device: self.config.preferred_output_device.clone(),
                running: Arc::clone(&self.running),
                queue_poll: self.config.queue_poll,
            };
            tokio::task::spawn_blocking(move || playback::run(ctx));
        }

        // ── Presentation poll task ────────────────────────────────────────
        {
            let running = Arc::clone(&self.running);
            let shared = Arc::clone(&self.shared);
            let display_tx = self.display_tx.clone();
            let seq = Arc::clone(&self.seq);
            let poll = self.config.display_poll;
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(poll);
                let mut latest: Option<TranslationPair> = None;
                loop {
                    interval.tick().await;
                    if !running.load(Ordering::Relaxed) {
                        break;
                    }
                    // Most-recent-wins: older pairs between polls are
                    // consumed without being shown.
                    if let Some(pair) = pair_rx.drain_latest() {
                        latest = Some(pair);
                    }
                    let speaking = shared.speaking.load(Ordering::Relaxed);
                    let latency = *shared.last_latency.lock();
                    let latency_ms = latency.map(|d| d.as_secs_f64() * 1_000.0);
                    let status_line = match latency_ms {
                        Some(ms) => format!(
                            "{:.0} ms | {}",
                            ms,
                            if speaking { "speaking" } else { "silent" }
                        ),
                        None => if speaking { "speaking" } else { "silent" }.to_string(),
                    };
                    let update = DisplayUpdate {
                        seq: seq.fetch_add(1, Ordering::Relaxed),
                        original: latest.as_ref().map(|p| p.original.clone()),
                        translated: latest.as_ref().map(|p| p.translated.clone()),
                        latency_ms,
                        speaking,
                        status_line,
                    };
                    let _ = display_tx.send(update);
                }
            });
        }

        info!("engine started — listening");
        Ok(())
    }

    /// Stop all workers.
    ///
    /// # Errors
    /// - `TraduxError::NotRunning` if not currently running.
    pub fn stop(&self) -> Result<()> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(TraduxError::NotRunning);
        }

        self.running.store(false, Ordering::SeqCst);
        self.set_status(PipelineStatus::Stopped, None);
        info!("engine stop requested");
        Ok(())
    }

    /// Current engine status (snapshot).
    pub fn status(&self) -> PipelineStatus {
        *self.status.lock()
    }

    /// Subscribe to polled display updates.
    pub fn subscribe_display(&self) -> broadcast::Receiver<DisplayUpdate> {
        self.display_tx.subscribe()
    }

    /// Subscribe to lifecycle status events.
    pub fn subscribe_status(&self) -> broadcast::Receiver<PipelineStatusEvent> {
        self.status_tx.subscribe()
    }

    /// Subscribe to per-frame activity events.
    pub fn subscribe_activity(&self) -> broadcast::Receiver<ActivityEvent> {
        self.activity_tx.subscribe()
    }

    /// Snapshot of pipeline counters for observability.
    pub fn diagnostics_snapshot(&self) -> DiagnosticsSnapshot {
        self.shared.diagnostics.snapshot()
    }

    /// Write the rolling raw-audio diagnostic ring to a WAV file.
    ///
    /// The ring holds the last few seconds of capture audio at the pipeline
    /// rate, independent of gate decisions.
    pub fn write_recent_audio_wav(&self, path: &std::path::Path) -> Result<()> {
        let samples = self.shared.recent_audio.lock().clone();
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.config.pipeline_sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec)
            .map_err(|e| TraduxError::Other(e.into()))?;
        for sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| TraduxError::Other(e.into()))?;
        }
        writer
            .finalize()
            .map_err(|e| TraduxError::Other(e.into()))?;
        Ok(())
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    fn set_status(&self, new_status: PipelineStatus, detail: Option<String>) {
        *self.status.lock() = new_status;
        let _ = self.status_tx.send(PipelineStatusEvent {
            status: new_status,
            detail,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readiness_signal_wakes_waiter() {
        let readiness = Readiness::new();
        let waiter = readiness.clone();
        let handle = std::thread::spawn(move || waiter.wait_timeout(Duration::from_secs(2)));
        std::thread::sleep(Duration::from_millis(20));
        readiness.signal(true);
        assert_eq!(handle.join().unwrap(), Some(true));
    }

    #[test]
    fn readiness_timeout_returns_none() {
        let readiness = Readiness::new();
        assert_eq!(readiness.wait_timeout(Duration::from_millis(30)), None);
    }

    #[test]
    fn readiness_reports_failed_warmup() {
        let readiness = Readiness::new();
        readiness.signal(false);
        assert_eq!(readiness.wait_timeout(Duration::from_millis(10)), Some(false));
    }

    #[test]
    fn recent_audio_ring_is_capped() {
        let shared = PipelineShared::default();
        shared.append_recent(&[0.1; 600], 1_000);
        shared.append_recent(&[0.2; 600], 1_000);
        let buf = shared.recent_audio.lock();
        assert_eq!(buf.len(), 1_000);
        // Oldest samples were evicted; the tail is the newest batch.
        assert!((buf[buf.len() - 1] - 0.2).abs() < f32::EPSILON);
        assert!((buf[0] - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn recent_audio_oversized_batch_keeps_tail() {
        let shared = PipelineShared::default();
        let batch: Vec<f32> = (0..2_000).map(|i| i as f32).collect();
        shared.append_recent(&batch, 500);
        let buf = shared.recent_audio.lock();
        assert_eq!(buf.len(), 500);
        assert!((buf[0] - 1_500.0).abs() < f32::EPSILON);
    }

    #[test]
    fn frame_len_follows_rate_and_duration() {
        let config = PipelineConfig::default();
        assert_eq!(config.frame_len(), 1_600);
        assert_eq!(config.diagnostic_ring_len(), 48_000);
    }
}
