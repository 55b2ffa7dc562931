//! Buffering primitives between pipeline stages.
//!
//! Two kinds of hand-off live here:
//!
//! - Lock-free SPSC ring buffers ([`ringbuf`]) between the real-time audio
//!   callbacks and the worker threads. `push_slice`/`pop_slice` are wait-free
//!   and allocation-free, safe from the device callback.
//! - [`queue`] bounded FIFO queues (crossbeam) between workers, with an
//!   explicit policy for the full-queue case.

pub mod accum;
pub mod frame;
pub mod queue;

use ringbuf::{traits::Split, HeapRb};

pub use ringbuf::traits::{Consumer, Producer};

/// Producer half of the capture ring — held by the input audio callback.
pub type CaptureProducer = ringbuf::HeapProd<f32>;

/// Consumer half of the capture ring — held by the capture worker.
pub type CaptureConsumer = ringbuf::HeapCons<f32>;

/// Producer half of the playback ring — held by the playback worker.
pub type PlaybackProducer = ringbuf::HeapProd<f32>;

/// Consumer half of the playback ring — held by the output audio callback.
pub type PlaybackConsumer = ringbuf::HeapCons<f32>;

/// Capture ring capacity: 2^20 = 1 048 576 f32 samples ≈ 21.8 s at 48 kHz.
/// Covers a long transcription stall without dropping callback audio.
pub const CAPTURE_RING_CAPACITY: usize = 1 << 20;

/// Playback ring capacity: 2^18 = 262 144 f32 samples ≈ 5.5 s at 48 kHz.
/// One synthesized utterance plus headroom; the playback worker blocks on
/// ring availability rather than growing memory.
pub const PLAYBACK_RING_CAPACITY: usize = 1 << 18;

/// Create the capture-side producer/consumer pair.
pub fn create_capture_ring() -> (CaptureProducer, CaptureConsumer) {
    HeapRb::<f32>::new(CAPTURE_RING_CAPACITY).split()
}

/// Create the playback-side producer/consumer pair.
pub fn create_playback_ring() -> (PlaybackProducer, PlaybackConsumer) {
    HeapRb::<f32>::new(PLAYBACK_RING_CAPACITY).split()
}
