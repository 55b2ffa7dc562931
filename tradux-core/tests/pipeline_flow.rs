//! Cross-worker scenarios: gate → accumulation → dispatch → sentence gate →
//! synthesis, driven by scripted collaborators and a scripted clock.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex as StdMutex,
};
use std::thread;
use std::time::{Duration, Instant};

use tradux_core::buffering::frame::AudioFrame;
use tradux_core::buffering::queue::{self, FullPolicy, QueueReceiver, QueueSender};
use tradux_core::engines::{
    Synthesizer, SynthesizerHandle, Transcriber, TranscriberHandle, TranslationEngine,
    TranslatorHandle,
};
use tradux_core::error::Result;
use tradux_core::events::TranslationPair;
use tradux_core::gate::{ActivityGate, Clock};
use tradux_core::pipeline::{dispatch, speak, PipelineConfig, PipelineShared, Readiness};

// ---------------------------------------------------------------------------
// Scripted collaborators
// ---------------------------------------------------------------------------

struct FixedTranscriber {
    output: String,
    calls: Arc<AtomicUsize>,
}

impl Transcriber for FixedTranscriber {
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }

    fn transcribe(&mut self, _samples: &[f32], _rate: u32, _lang: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.output.clone())
    }
}

/// Transcriber that takes a while, to simulate real inference cost.
struct SlowTranscriber {
    output: String,
    delay: Duration,
}

impl Transcriber for SlowTranscriber {
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }

    fn transcribe(&mut self, _samples: &[f32], _rate: u32, _lang: &str) -> Result<String> {
        thread::sleep(self.delay);
        Ok(self.output.clone())
    }
}

struct IdentityTranslator;

impl TranslationEngine for IdentityTranslator {
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }

    fn translate(&mut self, text: &str, _source: &str, _target: &str) -> Result<String> {
        Ok(text.to_string())
    }
}

struct CountingSynth {
    calls: Arc<AtomicUsize>,
}

impl Synthesizer for CountingSynth {
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        22_050
    }

    fn synthesize(&mut self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(vec![0.1; text.len().max(1) * 16])
    }
}

// ---------------------------------------------------------------------------
// Scripted clock for the activity gate
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct ManualClock {
    now: Arc<StdMutex<Instant>>,
}

impl ManualClock {
    fn new() -> Self {
        Self {
            now: Arc::new(StdMutex::new(Instant::now())),
        }
    }

    fn advance(&self, d: Duration) {
        *self.now.lock().unwrap() += d;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ready() -> Readiness {
    let readiness = Readiness::new();
    readiness.signal(true);
    readiness
}

fn dispatch_ctx(
    config: PipelineConfig,
    transcript: &str,
    frame_rx: QueueReceiver<AudioFrame>,
    pair_tx: QueueSender<TranslationPair>,
    synth_tx: QueueSender<String>,
    shared: Arc<PipelineShared>,
    running: Arc<AtomicBool>,
    transcribe_calls: Arc<AtomicUsize>,
) -> dispatch::DispatchContext {
    dispatch::DispatchContext {
        config,
        frame_rx,
        pair_tx,
        synth_tx,
        transcriber: TranscriberHandle::new(FixedTranscriber {
            output: transcript.into(),
            calls: transcribe_calls,
        }),
        translator: TranslatorHandle::new(IdentityTranslator),
        running,
        shared,
        readiness: ready(),
    }
}

/// Push `secs` worth of 100 ms frames through a scripted-clock gate into the
/// frame queue, the way the capture worker would.
fn feed_through_gate(
    gate: &mut ActivityGate<ManualClock>,
    clock: &ManualClock,
    frame_tx: &QueueSender<AudioFrame>,
    secs: f64,
    amplitude: f32,
) {
    let frames = (secs / 0.1).round() as usize;
    for _ in 0..frames {
        clock.advance(Duration::from_millis(100));
        let frame = AudioFrame::new(vec![amplitude; 1_600], 16_000);
        if gate.observe(&frame).forward {
            frame_tx.push(frame);
        }
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

/// 1.2 s of speech-level audio followed by 1.0 s of silence produces exactly
/// one dispatch, triggered by the duration threshold — not by forced flush.
#[test]
fn speech_then_silence_dispatches_exactly_once_via_threshold() {
    let mut config = PipelineConfig::default();
    config.min_process_duration = Duration::from_secs(1);
    config.silence_duration = Duration::from_millis(250);
    // Keep the staleness flush out of this scenario's way.
    config.forced_flush_after = Duration::from_secs(10);

    let clock = ManualClock::new();
    let mut gate = ActivityGate::with_clock(
        config.silence_threshold,
        config.silence_duration,
        clock.clone(),
    );

    let (frame_tx, frame_rx) = queue::channel(64, FullPolicy::DropNewest);
    let (pair_tx, pair_rx) = queue::channel(16, FullPolicy::DropOldest);
    let (synth_tx, _synth_rx) = queue::channel(8, FullPolicy::DropNewest);
    let shared = Arc::new(PipelineShared::default());
    let running = Arc::new(AtomicBool::new(true));
    let transcribe_calls = Arc::new(AtomicUsize::new(0));

    feed_through_gate(&mut gate, &clock, &frame_tx, 1.2, 0.5);
    feed_through_gate(&mut gate, &clock, &frame_tx, 1.0, 0.0);

    let ctx = dispatch_ctx(
        config,
        "exactly one dispatch expected.",
        frame_rx,
        pair_tx,
        synth_tx,
        Arc::clone(&shared),
        Arc::clone(&running),
        Arc::clone(&transcribe_calls),
    );
    let handle = thread::spawn(move || dispatch::run(ctx));

    let pair = pair_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("the one dispatch");
    assert_eq!(pair.translated, "exactly one dispatch expected.");

    // Let the worker chew through every remaining queued frame.
    thread::sleep(Duration::from_millis(300));
    running.store(false, Ordering::SeqCst);
    handle.join().expect("dispatch worker panicked");

    let snap = shared.diagnostics.snapshot();
    assert_eq!(snap.dispatch_cycles, 1, "exactly one dispatch");
    assert_eq!(snap.forced_flushes, 0, "threshold-triggered, not forced");
    assert!(pair_rx.try_recv().is_none());
    assert_eq!(transcribe_calls.load(Ordering::Relaxed), 1);
}

/// "Bonjour." is one word but carries terminal punctuation, so it flows all
/// the way into a synthesis request.
#[test]
fn bonjour_reaches_synthesis_despite_word_count() {
    let mut config = PipelineConfig::default();
    config.min_process_duration = Duration::from_millis(200);
    config.queue_poll = Duration::from_millis(20);

    let (frame_tx, frame_rx) = queue::channel(64, FullPolicy::DropNewest);
    let (pair_tx, pair_rx) = queue::channel(16, FullPolicy::DropOldest);
    let (synth_tx, synth_rx) = queue::channel(8, FullPolicy::DropNewest);
    let (wave_tx, wave_rx) = queue::channel(8, FullPolicy::DropNewest);
    let shared = Arc::new(PipelineShared::default());
    let running = Arc::new(AtomicBool::new(true));
    let transcribe_calls = Arc::new(AtomicUsize::new(0));
    let synth_calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
        frame_tx.push(AudioFrame::new(vec![0.5; 1_600], 16_000));
    }

    let d_ctx = dispatch_ctx(
        config.clone(),
        "Bonjour.",
        frame_rx,
        pair_tx,
        synth_tx,
        Arc::clone(&shared),
        Arc::clone(&running),
        Arc::clone(&transcribe_calls),
    );
    let s_ctx = speak::SpeakContext {
        synth_rx,
        wave_tx,
        synthesizer: SynthesizerHandle::new(CountingSynth {
            calls: Arc::clone(&synth_calls),
        }),
        running: Arc::clone(&running),
        shared: Arc::clone(&shared),
        queue_poll: config.queue_poll,
        readiness: ready(),
    };

    let d_handle = thread::spawn(move || dispatch::run(d_ctx));
    let s_handle = thread::spawn(move || speak::run(s_ctx));

    let pair = pair_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("pair on the text path");
    assert_eq!(pair.original, "Bonjour.");

    let wave = wave_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("waveform for Bonjour.");
    assert!(!wave.is_empty());

    running.store(false, Ordering::SeqCst);
    d_handle.join().expect("dispatch worker panicked");
    s_handle.join().expect("synthesis worker panicked");

    assert_eq!(synth_calls.load(Ordering::Relaxed), 1);
    assert_eq!(shared.diagnostics.snapshot().synthesis_requests, 1);
}

/// Flipping the running flag stops every worker within roughly one
/// queue-timeout interval.
#[test]
fn workers_exit_within_one_queue_timeout() {
    let mut config = PipelineConfig::default();
    config.queue_poll = Duration::from_millis(100);

    let (_frame_tx, frame_rx) = queue::channel::<AudioFrame>(64, FullPolicy::DropNewest);
    let (pair_tx, _pair_rx) = queue::channel(16, FullPolicy::DropOldest);
    let (synth_tx, synth_rx) = queue::channel(8, FullPolicy::DropNewest);
    let (wave_tx, _wave_rx) = queue::channel(8, FullPolicy::DropNewest);
    let shared = Arc::new(PipelineShared::default());
    let running = Arc::new(AtomicBool::new(true));

    let d_ctx = dispatch_ctx(
        config.clone(),
        "unused",
        frame_rx,
        pair_tx,
        synth_tx,
        Arc::clone(&shared),
        Arc::clone(&running),
        Arc::new(AtomicUsize::new(0)),
    );
    let s_ctx = speak::SpeakContext {
        synth_rx,
        wave_tx,
        synthesizer: SynthesizerHandle::new(CountingSynth {
            calls: Arc::new(AtomicUsize::new(0)),
        }),
        running: Arc::clone(&running),
        shared: Arc::clone(&shared),
        queue_poll: config.queue_poll,
        readiness: ready(),
    };

    let d_handle = thread::spawn(move || dispatch::run(d_ctx));
    let s_handle = thread::spawn(move || speak::run(s_ctx));

    // Let both workers settle into their receive loops.
    thread::sleep(Duration::from_millis(150));

    let flipped = Instant::now();
    running.store(false, Ordering::SeqCst);
    d_handle.join().expect("dispatch worker panicked");
    s_handle.join().expect("synthesis worker panicked");
    let elapsed = flipped.elapsed();

    // One queue-timeout interval plus scheduling slack.
    assert!(
        elapsed < Duration::from_millis(500),
        "workers took {elapsed:?} to exit"
    );
}

/// Sustained producer overload never grows the frame queue past its
/// capacity, and the pipeline keeps making progress rather than deadlocking.
#[test]
fn frame_queue_stays_bounded_under_overload() {
    let mut config = PipelineConfig::default();
    config.min_process_duration = Duration::from_millis(100);
    config.frame_queue_capacity = 8;

    let (frame_tx, frame_rx) = queue::channel(config.frame_queue_capacity, FullPolicy::DropNewest);
    let (pair_tx, pair_rx) = queue::channel(4, FullPolicy::DropOldest);
    let (synth_tx, _synth_rx) = queue::channel(4, FullPolicy::DropNewest);
    let shared = Arc::new(PipelineShared::default());
    let running = Arc::new(AtomicBool::new(true));

    let ctx = dispatch::DispatchContext {
        config,
        frame_rx,
        pair_tx,
        synth_tx,
        transcriber: TranscriberHandle::new(SlowTranscriber {
            output: "overload pair with punctuation.".into(),
            delay: Duration::from_millis(5),
        }),
        translator: TranslatorHandle::new(IdentityTranslator),
        running: Arc::clone(&running),
        shared: Arc::clone(&shared),
        readiness: ready(),
    };
    let handle = thread::spawn(move || dispatch::run(ctx));

    // Produce far faster than the consumer drains.
    for _ in 0..1_000 {
        frame_tx.push(AudioFrame::new(vec![0.5; 1_600], 16_000));
    }

    // Pairs keep coming out the other side — no deadlock.
    pair_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("pipeline still making progress");

    running.store(false, Ordering::SeqCst);
    handle.join().expect("dispatch worker panicked");
    // The drop counter confirms overload was absorbed by policy, not memory.
    assert!(frame_tx.dropped() > 0);
}
