//! Stub collaborators — deterministic placeholders without real inference.
//!
//! Let the full capture → dispatch → synthesis → playback pipeline run
//! end-to-end before any model files are installed, and double as scripted
//! backends in tests.

use std::f32::consts::TAU;

use tracing::debug;

use crate::engines::{Synthesizer, TranslationEngine, Transcriber};
use crate::error::Result;

/// Echo-style transcriber: reports what it heard rather than recognising it.
pub struct StubTranscriber {
    utterance_count: u32,
}

impl StubTranscriber {
    pub fn new() -> Self {
        Self { utterance_count: 0 }
    }
}

impl Default for StubTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcriber for StubTranscriber {
    fn warm_up(&mut self) -> Result<()> {
        debug!("StubTranscriber::warm_up — no-op");
        Ok(())
    }

    fn transcribe(&mut self, samples: &[f32], sample_rate: u32, language: &str) -> Result<String> {
        // Below ~10 ms there is nothing worth echoing.
        if samples.len() < (sample_rate / 100) as usize {
            return Ok(String::new());
        }
        self.utterance_count += 1;
        Ok(format!(
            "[heard {} samples of {} #{}.]",
            samples.len(),
            language,
            self.utterance_count
        ))
    }
}

/// Tagging translator: wraps the input in the target language code.
pub struct StubTranslator;

impl TranslationEngine for StubTranslator {
    fn warm_up(&mut self) -> Result<()> {
        debug!("StubTranslator::warm_up — no-op");
        Ok(())
    }

    fn translate(&mut self, text: &str, _source: &str, target: &str) -> Result<String> {
        Ok(format!("[{target}] {text}"))
    }
}

/// Tone synthesizer: a short sine burst whose length tracks the text length.
pub struct StubSynthesizer {
    sample_rate: u32,
}

impl StubSynthesizer {
    pub fn new() -> Self {
        Self {
            sample_rate: 22_050,
        }
    }
}

impl Default for StubSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Synthesizer for StubSynthesizer {
    fn warm_up(&mut self) -> Result<()> {
        debug!("StubSynthesizer::warm_up — no-op");
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn synthesize(&mut self, text: &str) -> Result<Vec<f32>> {
        // ~60 ms of tone per character, 440 Hz, gentle amplitude.
        let samples_per_char = (self.sample_rate as usize * 60) / 1000;
        let len = samples_per_char * text.chars().count().max(1);
        let wave = (0..len)
            .map(|i| {
                let t = i as f32 / self.sample_rate as f32;
                0.2 * (TAU * 440.0 * t).sin()
            })
            .collect();
        Ok(wave)
    }
}
