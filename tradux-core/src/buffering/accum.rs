//! Rolling accumulation buffer owned by the dispatch worker.
//!
//! Frames append until the duration readiness threshold is met; when the
//! buffer reaches its maximum window it is truncated to a short trailing
//! overlap so transcription keeps cross-window context without unbounded
//! growth.

use std::time::Duration;

use crate::buffering::frame::AudioFrame;

/// Ordered sample accumulation with duration bookkeeping.
///
/// Owned exclusively by the dispatch stage — no interior locking.
#[derive(Debug)]
pub struct AccumulationBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AccumulationBuffer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            samples: Vec::new(),
            sample_rate,
        }
    }

    /// Append one captured frame.
    pub fn push_frame(&mut self, frame: &AudioFrame) {
        debug_assert_eq!(frame.sample_rate, self.sample_rate);
        self.samples.extend_from_slice(&frame.samples);
    }

    /// Accumulated duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Peak absolute amplitude over the whole buffer.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the duration readiness threshold is met.
    pub fn is_ready(&self, min_process: Duration) -> bool {
        self.duration_secs() >= min_process.as_secs_f64()
    }

    /// Whether the buffer has reached its maximum window.
    pub fn at_max_window(&self, max_window: Duration) -> bool {
        self.duration_secs() >= max_window.as_secs_f64()
    }

    /// Read-only view of the accumulated samples, for collaborator calls.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Truncate to exactly the trailing `overlap` worth of samples.
    ///
    /// The retained tail carries short-range context across window
    /// boundaries. A buffer shorter than the overlap is left untouched.
    pub fn truncate_to_overlap(&mut self, overlap: Duration) {
        let keep = (overlap.as_secs_f64() * self.sample_rate as f64) as usize;
        if keep == 0 {
            self.samples.clear();
            return;
        }
        if self.samples.len() <= keep {
            return;
        }
        let drop = self.samples.len() - keep;
        self.samples.drain(..drop);
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn frame(samples: Vec<f32>) -> AudioFrame {
        AudioFrame::new(samples, 16_000)
    }

    #[test]
    fn duration_accumulates_across_frames() {
        let mut buf = AccumulationBuffer::new(16_000);
        buf.push_frame(&frame(vec![0.0; 1_600]));
        buf.push_frame(&frame(vec![0.0; 1_600]));
        assert_relative_eq!(buf.duration_secs(), 0.2);
    }

    #[test]
    fn readiness_at_duration_threshold() {
        let mut buf = AccumulationBuffer::new(16_000);
        buf.push_frame(&frame(vec![0.0; 15_999]));
        assert!(!buf.is_ready(Duration::from_secs(1)));
        buf.push_frame(&frame(vec![0.0; 1]));
        assert!(buf.is_ready(Duration::from_secs(1)));
    }

    #[test]
    fn truncation_retains_exact_overlap() {
        let mut buf = AccumulationBuffer::new(16_000);
        // 1.0 s of a recognizable ramp so we can check WHICH samples survive.
        let ramp: Vec<f32> = (0..16_000).map(|i| i as f32 / 16_000.0).collect();
        buf.push_frame(&frame(ramp));

        buf.truncate_to_overlap(Duration::from_millis(200));

        // Exactly 0.2 s remain — never zero, never the full prior buffer.
        assert_eq!(buf.len(), 3_200);
        assert_relative_eq!(buf.duration_secs(), 0.2);
        // And it is the TRAILING tail that was kept.
        assert_relative_eq!(buf.samples()[0], 12_800.0 / 16_000.0);
    }

    #[test]
    fn truncation_of_short_buffer_is_a_noop() {
        let mut buf = AccumulationBuffer::new(16_000);
        buf.push_frame(&frame(vec![0.5; 1_000]));
        buf.truncate_to_overlap(Duration::from_millis(200));
        assert_eq!(buf.len(), 1_000);
    }

    #[test]
    fn zero_overlap_clears() {
        let mut buf = AccumulationBuffer::new(16_000);
        buf.push_frame(&frame(vec![0.5; 1_000]));
        buf.truncate_to_overlap(Duration::ZERO);
        assert!(buf.is_empty());
    }

    #[test]
    fn peak_spans_all_frames() {
        let mut buf = AccumulationBuffer::new(16_000);
        buf.push_frame(&frame(vec![0.1; 100]));
        buf.push_frame(&frame(vec![-0.7; 100]));
        assert_relative_eq!(buf.peak(), 0.7);
    }
}
