//! # Parsed MIDI Input Types
//!
//! This module defines the shape of a MIDI performance as handed over by an external
//! MIDI file parser. Nothing here reads raw MIDI bytes; the parser is expected to have
//! paired note-on/note-off messages into [`RawNoteEvent`]s with absolute times.
//!
//! ## Type Hierarchy
//! ```text
//! ParsedMidi
//!   ├── events: Vec<RawNoteEvent>           (note, velocity, time, duration, channel)
//!   ├── tempo_changes: Vec<TempoSegment>    (time in seconds, bpm, µs per beat)
//!   ├── time_signatures: Vec<TimeSignatureSegment> (tick, numerator, denominator)
//!   ├── ticks_per_beat, format, duration_seconds
//!   └── track_names: Vec<String>            (passed through to the song)
//! ```
//!
//! ## Time Units
//! - Note events and tempo changes are in **seconds** (absolute, from the start of the file)
//! - Time signature changes are in **ticks** (MIDI's native unit, `ticks_per_beat` per quarter)
//! - A "beat" is always a quarter note, matching MIDI's tempo meta event
//!
//! ## JSON Shape
//! ```json
//! {
//!   "events": [{ "note": 60, "velocity": 80, "time": 0.0, "duration": 0.5, "channel": 0 }],
//!   "tempoChanges": [{ "time": 0.0, "bpm": 120.0, "microsecondsPerBeat": 500000 }],
//!   "timeSignatures": [{ "ticks": 0, "numerator": 4, "denominator": 4 }],
//!   "ticksPerBeat": 480,
//!   "format": 1,
//!   "durationSeconds": 2.0
//! }
//! ```

use serde::{Deserialize, Serialize};

pub const MICROS_PER_MINUTE: f64 = 60_000_000.0;
pub const DEFAULT_BPM: f64 = 120.0;

/// One sounding note, already paired from note-on/note-off by the parser.
///
/// Velocity 0 marks a note-off in raw MIDI; ingestion skips such events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNoteEvent {
    pub note: u8,
    pub velocity: u8,
    /// Absolute onset in seconds
    pub time: f64,
    /// Sounding length in seconds
    pub duration: f64,
    #[serde(default)]
    pub channel: u8,
}

/// A tempo change. Takes effect at `time` and lasts until the next segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TempoSegment {
    #[serde(default)]
    pub time: f64,
    #[serde(default)]
    pub bpm: f64,
    #[serde(default)]
    pub microseconds_per_beat: u32,
}

impl TempoSegment {
    pub fn from_bpm(time: f64, bpm: f64) -> Self {
        Self {
            time,
            bpm,
            microseconds_per_beat: (MICROS_PER_MINUTE / bpm).round() as u32,
        }
    }

    pub fn from_micros(time: f64, microseconds_per_beat: u32) -> Self {
        Self {
            time,
            bpm: MICROS_PER_MINUTE / microseconds_per_beat as f64,
            microseconds_per_beat,
        }
    }

    /// Effective quarter-note BPM.
    ///
    /// `bpm` wins when both fields are set; a zero `bpm` is derived from
    /// `microseconds_per_beat`. Returns `None` when neither is usable.
    pub fn effective_bpm(&self) -> Option<f64> {
        if self.bpm.is_finite() && self.bpm > 0.0 {
            Some(self.bpm)
        } else if self.microseconds_per_beat > 0 {
            Some(MICROS_PER_MINUTE / self.microseconds_per_beat as f64)
        } else {
            None
        }
    }
}

/// Time signature (e.g., 4/4, 3/4, 6/8) starting at an absolute tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSignatureSegment {
    #[serde(default)]
    pub ticks: u64,
    pub numerator: u8,
    pub denominator: u8,
}

impl TimeSignatureSegment {
    pub fn new(ticks: u64, numerator: u8, denominator: u8) -> Self {
        Self {
            ticks,
            numerator,
            denominator,
        }
    }
}

/// A complete parsed performance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedMidi {
    pub events: Vec<RawNoteEvent>,
    #[serde(default)]
    pub tempo_changes: Vec<TempoSegment>,
    #[serde(default)]
    pub time_signatures: Vec<TimeSignatureSegment>,
    pub ticks_per_beat: u16,
    #[serde(default)]
    pub format: u16,
    pub duration_seconds: f64,
    #[serde(default)]
    pub track_names: Vec<String>,
}

impl ParsedMidi {
    /// Load a parsed performance from its JSON form
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
