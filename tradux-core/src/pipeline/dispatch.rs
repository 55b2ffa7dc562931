//! Accumulation & dispatch worker.
//!
//! ## Per cycle
//!
//! ```text
//! 1. Pull gated frames with a 100 ms timeout; append to the buffer
//! 2. Ready when duration ≥ min_process_duration, or on forced flush
//!    (timeout with a non-empty buffer idle for > forced_flush_after)
//! 3. Skip pure silence (peak below threshold while the gate is Silent)
//! 4. Transcribe; discard whitespace-only output; record as "current"
//! 5. Debounce: within translation_debounce of the last translation,
//!    stop here — the transcription stays recorded, translation waits
//! 6. Translate; record the call's wall-clock cost as the latency stat;
//!    publish the pair (drop-oldest queue)
//! 7. Sentence-qualified text (terminal punctuation or ≥ 3 words) goes to
//!    the synthesis queue (drop-newest)
//! 8. After a published translation, partition the buffer down to the
//!    overlap tail; reaching max_buffer_duration truncates regardless
//! ```
//!
//! Collaborator failures are per-cycle: logged, output discarded, next frame
//! proceeds. The worker itself only exits on the running flag.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Instant;

use crossbeam_channel::RecvTimeoutError;
use tracing::{debug, info, warn};

use crate::{
    buffering::{
        accum::AccumulationBuffer,
        frame::AudioFrame,
        queue::{QueueReceiver, QueueSender},
    },
    engines::{TranscriberHandle, TranslatorHandle},
    events::TranslationPair,
    pipeline::{PipelineConfig, PipelineShared, Readiness},
};

/// Sentence-terminal characters accepted by the sentence gate.
const SENTENCE_TERMINALS: &[char] = &['.', '!', '?', '…', '。', '！', '？'];

/// Minimum word count qualifying text without terminal punctuation.
const SENTENCE_MIN_WORDS: usize = 3;

pub struct DispatchContext {
    pub config: PipelineConfig,
    pub frame_rx: QueueReceiver<AudioFrame>,
    pub pair_tx: QueueSender<TranslationPair>,
    pub synth_tx: QueueSender<String>,
    pub transcriber: TranscriberHandle,
    pub translator: TranslatorHandle,
    pub running: Arc<AtomicBool>,
    pub shared: Arc<PipelineShared>,
    pub readiness: Readiness,
}

/// Timing state carried across dispatch cycles.
struct DispatchTiming {
    last_dispatch: Instant,
    last_translation: Option<Instant>,
}

/// Run the dispatch worker until `ctx.running` becomes false.
pub fn run(mut ctx: DispatchContext) {
    match ctx.readiness.wait_timeout(ctx.config.warmup_timeout) {
        Some(true) => info!("dispatch worker started — collaborators ready"),
        Some(false) => warn!("dispatch worker started with failed warm-up; expecting per-cycle errors"),
        None => warn!("warm-up timed out; dispatch worker proceeding anyway"),
    }

    let mut buffer = AccumulationBuffer::new(ctx.config.pipeline_sample_rate);
    let mut timing = DispatchTiming {
        last_dispatch: Instant::now(),
        last_translation: None,
    };

    loop {
        if !ctx.running.load(Ordering::Relaxed) {
            break;
        }

        match ctx.frame_rx.recv_timeout(ctx.config.queue_poll) {
            Ok(frame) => {
                buffer.push_frame(&frame);
                if buffer.is_ready(ctx.config.min_process_duration) {
                    dispatch_cycle(&mut ctx, &mut buffer, &mut timing);
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                // Forced flush: speech trailed off without filling the
                // buffer, don't stall indefinitely.
                if !buffer.is_empty()
                    && timing.last_dispatch.elapsed() > ctx.config.forced_flush_after
                {
                    ctx.shared
                        .diagnostics
                        .forced_flushes
                        .fetch_add(1, Ordering::Relaxed);
                    debug!(
                        buffered_secs = buffer.duration_secs(),
                        "forced flush of stale buffer"
                    );
                    dispatch_cycle(&mut ctx, &mut buffer, &mut timing);
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                // Capture stage gone — a permanently drained queue, not an
                // error. Keep observing the running flag at poll cadence.
                if !buffer.is_empty()
                    && timing.last_dispatch.elapsed() > ctx.config.forced_flush_after
                {
                    ctx.shared
                        .diagnostics
                        .forced_flushes
                        .fetch_add(1, Ordering::Relaxed);
                    dispatch_cycle(&mut ctx, &mut buffer, &mut timing);
                }
                std::thread::sleep(ctx.config.queue_poll);
            }
        }

        // Accumulation cap regardless of what the cycle did.
        if buffer.at_max_window(ctx.config.max_buffer_duration) {
            buffer.truncate_to_overlap(ctx.config.overlap_duration);
        }
    }

    info!("dispatch worker stopped");
}

/// One accumulation-buffer dispatch: transcribe, maybe translate, publish.
fn dispatch_cycle(
    ctx: &mut DispatchContext,
    buffer: &mut AccumulationBuffer,
    timing: &mut DispatchTiming,
) {
    timing.last_dispatch = Instant::now();
    ctx.shared
        .diagnostics
        .dispatch_cycles
        .fetch_add(1, Ordering::Relaxed);

    // Pure-silence guard: nothing above threshold and the gate agrees.
    if buffer.peak() < ctx.config.silence_threshold
        && !ctx.shared.speaking.load(Ordering::Relaxed)
    {
        ctx.shared
            .diagnostics
            .silence_skips
            .fetch_add(1, Ordering::Relaxed);
        return;
    }

    let text = {
        let mut transcriber = ctx.transcriber.0.lock();
        match transcriber.transcribe(
            buffer.samples(),
            ctx.config.pipeline_sample_rate,
            &ctx.config.source_language,
        ) {
            Ok(text) => text,
            Err(e) => {
                ctx.shared
                    .diagnostics
                    .engine_errors
                    .fetch_add(1, Ordering::Relaxed);
                warn!("transcription failed: {e}");
                return;
            }
        }
    };

    if text.trim().is_empty() {
        ctx.shared
            .diagnostics
            .empty_transcriptions
            .fetch_add(1, Ordering::Relaxed);
        return;
    }

    ctx.shared
        .diagnostics
        .transcriptions
        .fetch_add(1, Ordering::Relaxed);
    // Recorded as "current" whether or not translation runs this cycle —
    // transcription cadence is decoupled from translation cadence.
    *ctx.shared.current_transcription.lock() = text.clone();

    if let Some(last) = timing.last_translation {
        if last.elapsed() < ctx.config.translation_debounce {
            ctx.shared
                .diagnostics
                .translations_debounced
                .fetch_add(1, Ordering::Relaxed);
            debug!("translation debounced");
            return;
        }
    }

    let started = Instant::now();
    let translated = {
        let mut translator = ctx.translator.0.lock();
        match translator.translate(
            &text,
            &ctx.config.source_language,
            &ctx.config.target_language,
        ) {
            Ok(translated) => translated,
            Err(e) => {
                ctx.shared
                    .diagnostics
                    .engine_errors
                    .fetch_add(1, Ordering::Relaxed);
                warn!("translation failed: {e}");
                return;
            }
        }
    };
    let latency = started.elapsed();

    timing.last_translation = Some(Instant::now());
    *ctx.shared.last_latency.lock() = Some(latency);
    ctx.shared
        .diagnostics
        .translations
        .fetch_add(1, Ordering::Relaxed);

    debug!(
        latency_ms = latency.as_secs_f64() * 1_000.0,
        original = %text,
        translated = %translated,
        "translation published"
    );

    if ctx
        .pair_tx
        .push(TranslationPair::new(text, translated.clone()))
    {
        ctx.shared
            .diagnostics
            .pairs_published
            .fetch_add(1, Ordering::Relaxed);
    }

    if sentence_ready(&translated) {
        // Best-effort: a full synthesis queue drops the newest utterance.
        ctx.synth_tx.push(translated);
    }

    // Partition: keep the overlap tail for cross-window context.
    buffer.truncate_to_overlap(ctx.config.overlap_duration);
}

/// Sentence gate qualification: terminal punctuation, or enough words to be
/// worth speaking.
pub fn sentence_ready(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }
    trimmed.contains(SENTENCE_TERMINALS) || trimmed.split_whitespace().count() >= SENTENCE_MIN_WORDS
}
