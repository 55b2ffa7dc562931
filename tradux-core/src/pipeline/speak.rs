//! Sentence gate & synthesis dispatch worker.
//!
//! Pulls qualified translated text, deduplicates against the last text sent
//! to synthesis (case-sensitive), invokes the synthesizer and forwards the
//! waveform to playback. Synthesis failures drop the utterance and the
//! worker continues — spoken output is best-effort.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use tracing::{debug, info, warn};

use crate::{
    buffering::queue::{QueueReceiver, QueueSender},
    engines::SynthesizerHandle,
    pipeline::{PipelineShared, Readiness},
};

pub struct SpeakContext {
    pub synth_rx: QueueReceiver<String>,
    pub wave_tx: QueueSender<Vec<f32>>,
    pub synthesizer: SynthesizerHandle,
    pub running: Arc<AtomicBool>,
    pub shared: Arc<PipelineShared>,
    pub queue_poll: Duration,
    pub readiness: Readiness,
}

/// Run the synthesis worker until `ctx.running` becomes false.
pub fn run(ctx: SpeakContext) {
    // Same latch as dispatch; the timeout is generous because dispatch has
    // already waited it out by the time text can arrive.
    let _ = ctx.readiness.wait_timeout(Duration::from_secs(60));
    info!("synthesis worker started");

    // Last text actually sent to synthesis, for deduplication.
    let mut last_sent: Option<String> = None;

    loop {
        if !ctx.running.load(Ordering::Relaxed) {
            break;
        }

        let text = match ctx.synth_rx.recv_timeout(ctx.queue_poll) {
            Ok(text) => text,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                // Upstream gone — drained queue semantics, keep watching the
                // running flag.
                std::thread::sleep(ctx.queue_poll);
                continue;
            }
        };

        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if last_sent.as_deref() == Some(trimmed) {
            ctx.shared
                .diagnostics
                .dedup_skips
                .fetch_add(1, Ordering::Relaxed);
            debug!("duplicate utterance suppressed");
            continue;
        }

        // Bookkeeping happens at send time, success or not: a failed
        // synthesis still suppresses an immediate identical retry.
        last_sent = Some(trimmed.to_string());
        ctx.shared
            .diagnostics
            .synthesis_requests
            .fetch_add(1, Ordering::Relaxed);

        let waveform = {
            let mut synthesizer = ctx.synthesizer.0.lock();
            match synthesizer.synthesize(trimmed) {
                Ok(waveform) => waveform,
                Err(e) => {
                    ctx.shared
                        .diagnostics
                        .engine_errors
                        .fetch_add(1, Ordering::Relaxed);
                    warn!("synthesis failed, utterance dropped: {e}");
                    continue;
                }
            }
        };

        if !waveform.is_empty() {
            ctx.wave_tx.push(waveform);
        }
    }

    info!("synthesis worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use crate::buffering::queue::{self, FullPolicy};
    use crate::engines::Synthesizer;
    use crate::error::{Result, TraduxError};

    struct CountingSynth {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl Synthesizer for CountingSynth {
        fn warm_up(&mut self) -> Result<()> {
            Ok(())
        }

        fn sample_rate(&self) -> u32 {
            22_050
        }

        fn synthesize(&mut self, _text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.fail {
                return Err(TraduxError::Synthesis("intentional test failure".into()));
            }
            Ok(vec![0.1; 64])
        }
    }

    struct Harness {
        ctx: SpeakContext,
        text_tx: QueueSender<String>,
        wave_rx: QueueReceiver<Vec<f32>>,
        calls: Arc<AtomicUsize>,
        running: Arc<AtomicBool>,
    }

    fn harness(fail: bool) -> Harness {
        let (text_tx, synth_rx) = queue::channel(8, FullPolicy::DropNewest);
        let (wave_tx, wave_rx) = queue::channel(8, FullPolicy::DropNewest);
        let calls = Arc::new(AtomicUsize::new(0));
        let running = Arc::new(AtomicBool::new(true));
        let readiness = Readiness::new();
        readiness.signal(true);

        let ctx = SpeakContext {
            synth_rx,
            wave_tx,
            synthesizer: SynthesizerHandle::new(CountingSynth {
                calls: Arc::clone(&calls),
                fail,
            }),
            running: Arc::clone(&running),
            shared: Arc::new(PipelineShared::default()),
            queue_poll: Duration::from_millis(20),
            readiness,
        };

        Harness {
            ctx,
            text_tx,
            wave_rx,
            calls,
            running,
        }
    }

    #[test]
    fn duplicate_text_produces_exactly_one_synthesis_request() {
        let h = harness(false);
        let shared = Arc::clone(&h.ctx.shared);
        h.text_tx.push("Bonjour tout le monde.".to_string());
        h.text_tx.push("Bonjour tout le monde.".to_string());

        let ctx = h.ctx;
        let handle = std::thread::spawn(move || run(ctx));
        let wave = h
            .wave_rx
            .recv_timeout(Duration::from_secs(1))
            .expect("first waveform");
        assert!(!wave.is_empty());
        // Give the worker time to process (and dedup) the second item.
        std::thread::sleep(Duration::from_millis(100));
        h.running.store(false, Ordering::SeqCst);
        handle.join().expect("synthesis worker panicked");

        assert_eq!(h.calls.load(Ordering::Relaxed), 1);
        assert_eq!(shared.diagnostics.snapshot().dedup_skips, 1);
        assert!(h.wave_rx.try_recv().is_none());
    }

    #[test]
    fn distinct_texts_both_synthesize() {
        let h = harness(false);
        h.text_tx.push("Première phrase.".to_string());
        h.text_tx.push("Deuxième phrase.".to_string());

        let ctx = h.ctx;
        let handle = std::thread::spawn(move || run(ctx));
        h.wave_rx
            .recv_timeout(Duration::from_secs(1))
            .expect("first waveform");
        h.wave_rx
            .recv_timeout(Duration::from_secs(1))
            .expect("second waveform");
        h.running.store(false, Ordering::SeqCst);
        handle.join().expect("synthesis worker panicked");

        assert_eq!(h.calls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn synthesis_failure_drops_utterance_and_continues() {
        let h = harness(true);
        let shared = Arc::clone(&h.ctx.shared);
        h.text_tx.push("Ça va échouer.".to_string());
        h.text_tx.push("Encore une fois.".to_string());

        let ctx = h.ctx;
        let handle = std::thread::spawn(move || run(ctx));
        std::thread::sleep(Duration::from_millis(150));
        h.running.store(false, Ordering::SeqCst);
        handle.join().expect("synthesis worker panicked");

        // Both attempts ran; neither produced a waveform; worker survived.
        assert_eq!(h.calls.load(Ordering::Relaxed), 2);
        assert!(h.wave_rx.try_recv().is_none());
        assert_eq!(shared.diagnostics.snapshot().engine_errors, 2);
    }

    #[test]
    fn whitespace_text_is_discarded_before_synthesis() {
        let h = harness(false);
        h.text_tx.push("   ".to_string());

        let ctx = h.ctx;
        let handle = std::thread::spawn(move || run(ctx));
        std::thread::sleep(Duration::from_millis(80));
        h.running.store(false, Ordering::SeqCst);
        handle.join().expect("synthesis worker panicked");

        assert_eq!(h.calls.load(Ordering::Relaxed), 0);
    }
}
