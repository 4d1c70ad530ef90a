//! Session type definitions
//!
//! States, modes and the values passed to teaching hooks.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Playback lifecycle
///
/// ```text
/// Loaded ──play()──▶ Playing ◀──play()──▶ Paused
///                       │                   │
///                       ▼                   │
///                   Finished                │
///
/// Loaded / Playing / Paused ──stop()──▶ Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Loaded,
    Playing,
    Paused,
    Finished,
    Stopped,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Loaded => "loaded",
            SessionState::Playing => "playing",
            SessionState::Paused => "paused",
            SessionState::Finished => "finished",
            SessionState::Stopped => "stopped",
        }
    }

    /// `Finished` and `Stopped` accept no further `play()`
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Finished | SessionState::Stopped)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlaybackMode {
    /// Play every remaining measure in one `play()` call
    #[default]
    Continuous,
    /// Pause after each measure
    MeasureByMeasure,
}

/// Interjection priority (display only; nothing is filtered on it)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Med,
    Low,
}

/// A message pushed to the learner during playback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interjection {
    pub text: String,
    pub priority: Priority,
}

/// One teaching hook call, as recorded by [`RecordingHooks`](super::RecordingHooks)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum HookEvent {
    #[serde(rename_all = "camelCase")]
    MeasureStart {
        number: usize,
        teaching_note: Option<String>,
        dynamics: Option<String>,
    },
    KeyMoment { text: String },
    #[serde(rename_all = "camelCase")]
    SongComplete { measures_played: usize, title: String },
    Interjection(Interjection),
}

/// Point-in-time view of a session for UIs and logs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub song_id: String,
    pub state: SessionState,
    pub mode: PlaybackMode,
    /// 0-based index of the next measure to play
    pub current_measure: usize,
    pub measures_played: usize,
    pub total_measures: usize,
}
