//! Song type definitions
//!
//! This module defines the hand-separated, measure-quantized song produced by ingestion
//! and consumed by the playback session.
//!
//! ## Type Hierarchy
//! ```text
//! SongEntry
//!   ├── metadata (id, title, composer, key, tempo, time signature)
//!   ├── key_moments: Vec<String>         ("Bar 3: ...", "Bars 5-8: ...")
//!   ├── musical_language: MusicalLanguage
//!   └── Vec<Measure>                     (0-based, contiguous)
//!         ├── left: Vec<Chord>
//!         ├── right: Vec<Chord>
//!         │     └── Vec<ResolvedNote>    (sorted by pitch)
//!         ├── teaching_note, dynamics
//!         └── beats, bpm, duration_seconds, time_signature
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pitch::note_name;

/// Which hand plays a note
///
/// `Unknown` is the label a note carries between time resolution and hand separation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hand {
    Left,
    Right,
    #[default]
    Unknown,
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Hand::Left => "left",
            Hand::Right => "right",
            Hand::Unknown => "unknown",
        })
    }
}

/// Time signature (e.g., 4/4, 3/4, 6/8)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSignature {
    pub beats: u8,
    pub beat_type: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            beats: 4,
            beat_type: 4,
        }
    }
}

impl TimeSignature {
    /// Length of one measure in quarter-note beats (6/8 = 3.0, 3/4 = 3.0, 4/4 = 4.0)
    pub fn quarter_beats(&self) -> f64 {
        self.beats as f64 * 4.0 / self.beat_type as f64
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.beats, self.beat_type)
    }
}

/// A raw note placed on the measure grid
///
/// # Fields
/// - `time` / `duration`: absolute seconds, copied from the raw event
/// - `measure`: 0-based measure index
/// - `offset_ticks`: position within the measure in MIDI ticks
/// - `offset_beats` / `duration_beats`: the same in quarter-note beats (tempo independent)
/// - `name`: scientific pitch label ("C4")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedNote {
    pub note: u8,
    pub name: String,
    pub velocity: u8,
    pub channel: u8,
    pub time: f64,
    pub duration: f64,
    pub measure: usize,
    pub offset_ticks: u64,
    pub offset_beats: f64,
    pub duration_beats: f64,
    pub hand: Hand,
}

impl ResolvedNote {
    /// Copy of this note labelled for a hand; timing is untouched.
    pub fn with_hand(&self, hand: Hand) -> Self {
        Self {
            hand,
            ..self.clone()
        }
    }

    pub(crate) fn pitch_label(note: u8) -> String {
        note_name(note)
    }
}

/// Notes on one hand struck together
///
/// Members share `hand` and `measure` and are sorted by pitch ascending.
/// `time` and `offset_beats` are those of the earliest member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chord {
    pub hand: Hand,
    pub measure: usize,
    pub time: f64,
    pub offset_beats: f64,
    pub notes: Vec<ResolvedNote>,
}

impl Chord {
    pub fn pitches(&self) -> Vec<u8> {
        self.notes.iter().map(|n| n.note).collect()
    }

    /// Display label such as `"C4+E4+G4"`
    pub fn label(&self) -> String {
        self.notes
            .iter()
            .map(|n| n.name.as_str())
            .collect::<Vec<_>>()
            .join("+")
    }

    pub fn is_single_note(&self) -> bool {
        self.notes.len() == 1
    }
}

/// All chords for one hand in one measure, in onset order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureBucket {
    pub measure: usize,
    pub hand: Hand,
    pub chords: Vec<Chord>,
}

impl MeasureBucket {
    pub fn is_empty(&self) -> bool {
        self.chords.is_empty()
    }
}

/// Dynamics marking
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dynamics {
    Pp,
    P,
    Mp,
    Mf,
    F,
    Ff,
}

impl Dynamics {
    /// Nearest marking for a MIDI velocity
    ///
    /// Bands follow the common notation-software mapping (pp ≈ 33, p ≈ 49,
    /// mp ≈ 64, mf ≈ 80, f ≈ 96, ff ≈ 112).
    pub fn from_velocity(velocity: f64) -> Self {
        match velocity {
            v if v < 41.0 => Dynamics::Pp,
            v if v < 57.0 => Dynamics::P,
            v if v < 72.0 => Dynamics::Mp,
            v if v < 88.0 => Dynamics::Mf,
            v if v < 104.0 => Dynamics::F,
            _ => Dynamics::Ff,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Dynamics::Pp => "pp",
            Dynamics::P => "p",
            Dynamics::Mp => "mp",
            Dynamics::Mf => "mf",
            Dynamics::F => "f",
            Dynamics::Ff => "ff",
        }
    }
}

impl fmt::Display for Dynamics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One bar as played back
///
/// # Fields
/// - `index`: 0-based position in the song
/// - `number`: 1-based bar number used by key moments and teaching hooks
/// - `beats`: length in quarter-note beats
/// - `bpm`: tempo in effect at the start of the bar (playback paces the whole bar with it)
/// - `duration_seconds`: `beats * 60 / bpm`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measure {
    pub index: usize,
    pub number: usize,
    pub left: Vec<Chord>,
    pub right: Vec<Chord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teaching_note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamics: Option<Dynamics>,
    pub beats: f64,
    pub bpm: f64,
    pub duration_seconds: f64,
    pub time_signature: TimeSignature,
}

impl Measure {
    /// Both hands merged in onset order; left before right on equal onsets
    pub fn chords_in_order(&self) -> Vec<&Chord> {
        let mut chords: Vec<&Chord> = self.left.iter().chain(self.right.iter()).collect();
        chords.sort_by(|a, b| a.offset_beats.total_cmp(&b.offset_beats));
        chords
    }

    pub fn is_silent(&self) -> bool {
        self.left.is_empty() && self.right.is_empty()
    }

    pub fn note_count(&self) -> usize {
        self.left
            .iter()
            .chain(self.right.iter())
            .map(|c| c.notes.len())
            .sum()
    }
}

/// Descriptive block authored alongside a song
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MusicalLanguage {
    pub description: Option<String>,
    pub structure: Option<String>,
    pub techniques: Vec<String>,
    #[serde(alias = "style-tips")]
    pub style_tips: Vec<String>,
}

/// A fully assembled song
///
/// Owned by whoever stores songs; a playback session only ever borrows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongEntry {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<u8>,
    pub tempo: f64,
    pub time_signature: TimeSignature,
    pub total_measures: usize,
    pub duration_seconds: f64,
    pub measures: Vec<Measure>,
    #[serde(default)]
    pub key_moments: Vec<String>,
    #[serde(default)]
    pub musical_language: MusicalLanguage,
    #[serde(default)]
    pub track_names: Vec<String>,
}

impl SongEntry {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn measure(&self, index: usize) -> Option<&Measure> {
        self.measures.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(pitch: u8, offset_beats: f64) -> ResolvedNote {
        ResolvedNote {
            note: pitch,
            name: ResolvedNote::pitch_label(pitch),
            velocity: 80,
            channel: 0,
            time: offset_beats * 0.5,
            duration: 0.5,
            measure: 0,
            offset_ticks: (offset_beats * 480.0) as u64,
            offset_beats,
            duration_beats: 1.0,
            hand: Hand::Unknown,
        }
    }

    #[test]
    fn test_time_signature_quarter_beats() {
        assert_eq!(TimeSignature::default().quarter_beats(), 4.0);
        assert_eq!(TimeSignature { beats: 6, beat_type: 8 }.quarter_beats(), 3.0);
        assert_eq!(TimeSignature { beats: 2, beat_type: 2 }.quarter_beats(), 4.0);
    }

    #[test]
    fn test_dynamics_from_velocity() {
        assert_eq!(Dynamics::from_velocity(20.0), Dynamics::Pp);
        assert_eq!(Dynamics::from_velocity(64.0), Dynamics::Mp);
        assert_eq!(Dynamics::from_velocity(80.0), Dynamics::Mf);
        assert_eq!(Dynamics::from_velocity(127.0), Dynamics::Ff);
    }

    #[test]
    fn test_chord_label() {
        let chord = Chord {
            hand: Hand::Right,
            measure: 0,
            time: 0.0,
            offset_beats: 0.0,
            notes: vec![note(60, 0.0), note(64, 0.0), note(67, 0.0)],
        };
        assert_eq!(chord.label(), "C4+E4+G4");
        assert_eq!(chord.pitches(), vec![60, 64, 67]);
        assert!(!chord.is_single_note());
    }

    #[test]
    fn test_chords_in_order_merges_hands() {
        let chord = |hand, offset| Chord {
            hand,
            measure: 0,
            time: 0.0,
            offset_beats: offset,
            notes: vec![note(60, offset)],
        };
        let measure = Measure {
            index: 0,
            number: 1,
            left: vec![chord(Hand::Left, 0.0), chord(Hand::Left, 2.0)],
            right: vec![chord(Hand::Right, 1.0), chord(Hand::Right, 2.0)],
            teaching_note: None,
            dynamics: None,
            beats: 4.0,
            bpm: 120.0,
            duration_seconds: 2.0,
            time_signature: TimeSignature::default(),
        };
        let order: Vec<(Hand, f64)> = measure
            .chords_in_order()
            .iter()
            .map(|c| (c.hand, c.offset_beats))
            .collect();
        assert_eq!(
            order,
            vec![
                (Hand::Left, 0.0),
                (Hand::Right, 1.0),
                (Hand::Left, 2.0),
                (Hand::Right, 2.0)
            ]
        );
        assert_eq!(measure.note_count(), 4);
    }

    #[test]
    fn test_dynamics_serde_names() {
        let json = serde_json::to_string(&Dynamics::Mf).unwrap();
        assert_eq!(json, "\"mf\"");
        let parsed: Dynamics = serde_yaml::from_str("pp").unwrap();
        assert_eq!(parsed, Dynamics::Pp);
    }
}
