//! Event types broadcast to presentation subscribers.
//!
//! The display layer is deliberately loose-coupled: anything that can hold a
//! `tokio::sync::broadcast::Receiver` can render these. Serde camelCase keeps
//! them consumable from non-Rust front ends over JSON.

use std::time::Instant;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Translation pairs
// ---------------------------------------------------------------------------

/// The unit delivered to both the presentation queue and the sentence gate.
///
/// Transient — consumed once. `produced_at` stays internal (Instants do not
/// serialize); the polled [`DisplayUpdate`] carries the derived latency.
#[derive(Debug, Clone)]
pub struct TranslationPair {
    pub original: String,
    pub translated: String,
    pub produced_at: Instant,
}

impl TranslationPair {
    pub fn new(original: String, translated: String) -> Self {
        Self {
            original,
            translated,
            produced_at: Instant::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Display updates
// ---------------------------------------------------------------------------

/// Published by the presentation poll task, most-recent-wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayUpdate {
    /// Monotonically increasing update sequence number.
    pub seq: u64,
    /// Latest original-language text, if any pair has been produced yet.
    pub original: Option<String>,
    /// Latest translated text.
    pub translated: Option<String>,
    /// Wall-clock cost of the most recent translation call, milliseconds.
    pub latency_ms: Option<f64>,
    /// Whether the activity gate currently reports speech.
    pub speaking: bool,
    /// One-line latency/activity summary for plain status displays.
    pub status_line: String,
}

// ---------------------------------------------------------------------------
// Activity events
// ---------------------------------------------------------------------------

/// Emitted for each gated capture frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    /// Monotonically increasing event sequence number.
    pub seq: u64,
    /// Peak absolute amplitude of the frame in [0.0, 1.0].
    pub peak: f32,
    /// Gate decision for the frame.
    pub is_speech: bool,
}

// ---------------------------------------------------------------------------
// Pipeline status events
// ---------------------------------------------------------------------------

/// Emitted when the engine lifecycle state changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStatusEvent {
    pub status: PipelineStatus,
    /// Optional human-readable detail (e.g. error message).
    pub detail: Option<String>,
}

/// Current state of the Tradux engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    /// Engine created but `start()` not yet called.
    Idle,
    /// Warming up the model collaborators.
    WarmingUp,
    /// Actively capturing, translating and speaking.
    Listening,
    /// Capture stopped; engine may be restarted.
    Stopped,
    /// Unrecoverable error — restart required.
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_update_serializes_with_camel_case() {
        let update = DisplayUpdate {
            seq: 4,
            original: Some("bonjour".into()),
            translated: Some("hello".into()),
            latency_ms: Some(120.5),
            speaking: true,
            status_line: "120.5 ms | speaking".into(),
        };

        let json = serde_json::to_value(&update).expect("serialize display update");
        assert_eq!(json["seq"], 4);
        assert_eq!(json["original"], "bonjour");
        assert_eq!(json["translated"], "hello");
        let latency = json["latencyMs"].as_f64().expect("latency as number");
        assert!((latency - 120.5).abs() < 1e-9);
        assert_eq!(json["speaking"], true);

        let round_trip: DisplayUpdate =
            serde_json::from_value(json).expect("deserialize display update");
        assert_eq!(round_trip.seq, 4);
        assert_eq!(round_trip.translated.as_deref(), Some("hello"));
    }

    #[test]
    fn status_serializes_lowercase() {
        let event = PipelineStatusEvent {
            status: PipelineStatus::WarmingUp,
            detail: Some("loading collaborators".into()),
        };

        let json = serde_json::to_value(&event).expect("serialize status event");
        assert_eq!(json["status"], "warmingup");
        assert_eq!(json["detail"], "loading collaborators");

        let round_trip: PipelineStatusEvent =
            serde_json::from_value(json).expect("deserialize status event");
        assert_eq!(round_trip.status, PipelineStatus::WarmingUp);
    }

    #[test]
    fn activity_event_round_trips() {
        let event = ActivityEvent {
            seq: 9,
            peak: 0.42,
            is_speech: true,
        };
        let json = serde_json::to_value(&event).expect("serialize activity event");
        assert_eq!(json["isSpeech"], true);
        let round_trip: ActivityEvent =
            serde_json::from_value(json).expect("deserialize activity event");
        assert_eq!(round_trip.seq, 9);
    }
}
