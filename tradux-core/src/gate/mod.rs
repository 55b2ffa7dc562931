//! Speech activity gating with amplitude threshold and silence hysteresis.
//!
//! ## Algorithm
//!
//! 1. Compute the peak absolute amplitude of the incoming frame.
//! 2. Peak above `silence_threshold` → state becomes `Speaking`, the last
//!    speech timestamp is refreshed.
//! 3. While `Speaking`, only a continuous `silence_duration` below threshold
//!    reverts the state to `Silent` (hysteresis — brief pauses don't flap).
//! 4. A frame is forwarded downstream while `Speaking` OR within
//!    `2 × silence_duration` of the last speech event (trailing grace keeps
//!    word endings from being clipped).

use std::time::{Duration, Instant};

use crate::buffering::frame::AudioFrame;

/// Trait for time operations, allowing mock time in tests.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// Real system clock using `std::time::Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Whether the gate currently considers the speaker active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityState {
    Speaking,
    Silent,
}

/// Per-frame gate decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateDecision {
    /// State after observing the frame.
    pub state: ActivityState,
    /// Whether the frame should be forwarded to the dispatch stage.
    pub forward: bool,
}

/// Amplitude-threshold activity gate with silence hysteresis.
pub struct ActivityGate<C: Clock = SystemClock> {
    /// Peak amplitude above which a frame counts as speech.
    threshold: f32,
    /// Continuous below-threshold time required to revert to `Silent`.
    silence_duration: Duration,
    state: ActivityState,
    last_speech: Option<Instant>,
    clock: C,
}

impl ActivityGate<SystemClock> {
    pub fn new(threshold: f32, silence_duration: Duration) -> Self {
        Self::with_clock(threshold, silence_duration, SystemClock)
    }
}

impl<C: Clock> ActivityGate<C> {
    pub fn with_clock(threshold: f32, silence_duration: Duration, clock: C) -> Self {
        Self {
            threshold,
            silence_duration,
            state: ActivityState::Silent,
            last_speech: None,
            clock,
        }
    }

    /// Observe one frame and decide whether to forward it.
    pub fn observe(&mut self, frame: &AudioFrame) -> GateDecision {
        let now = self.clock.now();
        let peak = frame.peak();

        if peak > self.threshold {
            self.state = ActivityState::Speaking;
            self.last_speech = Some(now);
        } else if self.state == ActivityState::Speaking {
            let silent_for = self
                .last_speech
                .map(|t| now.duration_since(t))
                .unwrap_or(Duration::MAX);
            if silent_for > self.silence_duration {
                self.state = ActivityState::Silent;
            }
        }

        GateDecision {
            state: self.state,
            forward: self.should_forward(now),
        }
    }

    /// Speaking, or within the trailing grace window after the last speech.
    fn should_forward(&self, now: Instant) -> bool {
        if self.state == ActivityState::Speaking {
            return true;
        }
        match self.last_speech {
            Some(t) => now.duration_since(t) <= 2 * self.silence_duration,
            None => false,
        }
    }

    pub fn state(&self) -> ActivityState {
        self.state
    }

    pub fn last_speech(&self) -> Option<Instant> {
        self.last_speech
    }

    /// Clear state (between sessions).
    pub fn reset(&mut self) {
        self.state = ActivityState::Silent;
        self.last_speech = None;
    }
}
