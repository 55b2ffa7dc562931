//! # tradux-core
//!
//! Reusable live spoken-translation engine SDK.
//!
//! ## Architecture
//!
//! ```text
//! Microphone → AudioCapture → SPSC RingBuffer → capture worker (gate)
//!                                                    │ gated AudioFrames
//!                                              dispatch worker
//!                                      (accumulate → transcribe → translate)
//!                                          │                     │
//!                                 TranslationPair queue    synthesis queue
//!                                          │                     │
//!                                    poll task (50 ms)     speak worker
//!                                          │                     │
//!                             broadcast::Sender<DisplayUpdate>  playback worker
//!                                                                │
//!                                              SPSC RingBuffer → AudioPlayback → Speaker
//! ```
//!
//! The audio callbacks are zero-alloc. All heap work happens on worker threads.
//! Stages are connected by bounded queues with explicit full-queue policies;
//! every blocking receive carries a timeout so the running flag is observed
//! within one poll interval.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod buffering;
pub mod engines;
pub mod error;
pub mod events;
pub mod gate;
pub mod pipeline;

// Convenience re-exports for downstream crates
pub use engines::{
    EngineSet, SynthesizerHandle, TranscriberHandle, TranslatorHandle,
};
pub use error::TraduxError;
pub use events::{
    ActivityEvent, DisplayUpdate, PipelineStatus, PipelineStatusEvent, TranslationPair,
};
pub use pipeline::{PipelineConfig, TraduxEngine};
