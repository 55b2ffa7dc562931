//! Model collaborator abstractions.
//!
//! The three traits decouple the pipeline from any specific backend
//! (stub echo, whisper.cpp, ONNX seq2seq, a local TTS daemon, ...).
//!
//! `&mut self` on the inference calls intentionally expresses that backends
//! are stateful — decoder caches, session handles, hidden states. All
//! mutation is serialised through each handle's `parking_lot::Mutex`.

pub mod stub;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;

/// Speech-to-text collaborator.
pub trait Transcriber: Send + 'static {
    /// One-time warm-up: load weights, pre-allocate caches. Called once at
    /// engine startup, behind the readiness barrier.
    fn warm_up(&mut self) -> Result<()>;

    /// Transcribe mono f32 samples in the given source language.
    ///
    /// Synchronous from the pipeline's perspective. May return an empty
    /// string when no speech is recognised; the caller discards
    /// whitespace-only results.
    fn transcribe(&mut self, samples: &[f32], sample_rate: u32, language: &str) -> Result<String>;
}

/// Text-to-text translation collaborator.
pub trait TranslationEngine: Send + 'static {
    fn warm_up(&mut self) -> Result<()>;

    /// Translate `text` from `source` to `target` language codes.
    fn translate(&mut self, text: &str, source: &str, target: &str) -> Result<String>;
}

/// Text-to-speech collaborator.
pub trait Synthesizer: Send + 'static {
    fn warm_up(&mut self) -> Result<()>;

    /// Sample rate of the waveforms this backend produces (Hz).
    fn sample_rate(&self) -> u32;

    /// Synthesize a waveform for `text` at [`Self::sample_rate`].
    fn synthesize(&mut self, text: &str) -> Result<Vec<f32>>;
}

/// Thread-safe reference-counted handle to a [`Transcriber`].
#[derive(Clone)]
pub struct TranscriberHandle(pub Arc<Mutex<dyn Transcriber>>);

impl TranscriberHandle {
    pub fn new<T: Transcriber>(backend: T) -> Self {
        Self(Arc::new(Mutex::new(backend)))
    }
}

/// Thread-safe reference-counted handle to a [`TranslationEngine`].
#[derive(Clone)]
pub struct TranslatorHandle(pub Arc<Mutex<dyn TranslationEngine>>);

impl TranslatorHandle {
    pub fn new<T: TranslationEngine>(backend: T) -> Self {
        Self(Arc::new(Mutex::new(backend)))
    }
}

/// Thread-safe reference-counted handle to a [`Synthesizer`].
#[derive(Clone)]
pub struct SynthesizerHandle(pub Arc<Mutex<dyn Synthesizer>>);

impl SynthesizerHandle {
    pub fn new<T: Synthesizer>(backend: T) -> Self {
        Self(Arc::new(Mutex::new(backend)))
    }
}

/// The full collaborator set the pipeline runs against.
#[derive(Clone)]
pub struct EngineSet {
    pub transcriber: TranscriberHandle,
    pub translator: TranslatorHandle,
    pub synthesizer: SynthesizerHandle,
}

impl EngineSet {
    pub fn new(
        transcriber: TranscriberHandle,
        translator: TranslatorHandle,
        synthesizer: SynthesizerHandle,
    ) -> Self {
        Self {
            transcriber,
            translator,
            synthesizer,
        }
    }

    /// Warm up all three collaborators in order.
    ///
    /// # Errors
    /// Returns the first failure; the readiness barrier is signalled either
    /// way by the caller so workers never block forever.
    pub fn warm_up(&self) -> Result<()> {
        self.transcriber.0.lock().warm_up()?;
        self.translator.0.lock().warm_up()?;
        self.synthesizer.0.lock().warm_up()?;
        Ok(())
    }
}

impl std::fmt::Debug for EngineSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineSet").finish_non_exhaustive()
    }
}
