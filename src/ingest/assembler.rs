//! Song assembly
//!
//! Runs the ingestion pipeline end to end and produces a [`SongEntry`]:
//!
//! 1. Build the [`Timeline`] (tempo + meter maps) and count measures for the full duration
//! 2. Resolve raw events onto the measure grid
//! 3. Separate hands
//! 4. Slice into per-measure buckets and group chords
//! 5. Attach metadata: title, key moments, musical language, bar annotations
//!
//! Any failure aborts the whole song; a partial entry is never returned.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::IngestOptions;
use crate::error::EtudeError;
use crate::midi::{ParsedMidi, DEFAULT_BPM};
use crate::song::{Dynamics, Measure, MusicalLanguage, SongEntry};

use super::hands::HandSeparator;
use super::slicer::{slice_measures, MeasureSlice};
use super::timeline::Timeline;

/// Per-bar authored annotation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BarAnnotation {
    pub teaching_note: Option<String>,
    pub dynamics: Option<Dynamics>,
}

/// Authored metadata accompanying a performance (YAML sidecar)
///
/// ```yaml
/// title: Minuet in G
/// composer: Petzold
/// key: G
/// difficulty: 2
/// key-moments:
///   - "Bar 1: Establish the minuet's lilt"
///   - "Bars 9-12: Left hand takes the melody"
/// musical-language:
///   description: A dance in three
///   style-tips: ["Light touch on beat three"]
/// annotations:
///   1:
///     teaching-note: Start softly
///     dynamics: p
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SongMetadata {
    pub id: Option<String>,
    pub title: Option<String>,
    pub composer: Option<String>,
    pub key: Option<String>,
    pub difficulty: Option<u8>,
    pub key_moments: Vec<String>,
    pub musical_language: MusicalLanguage,
    /// Keyed by 1-based bar number
    pub annotations: BTreeMap<usize, BarAnnotation>,
}

impl SongMetadata {
    pub fn from_yaml(content: &str) -> Result<Self, EtudeError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let metadata: SongMetadata = serde_yaml::from_str(content)?;
        if metadata.annotations.contains_key(&0) {
            return Err(EtudeError::Metadata(
                "annotations are keyed by bar number, which starts at 1".to_string(),
            ));
        }
        Ok(metadata)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, EtudeError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }
}

/// Assemble a song from a parsed performance
///
/// # Errors
/// - [`EtudeError::Timeline`] for malformed tempo or time signature data
/// - [`EtudeError::InvalidInput`] for out-of-range events
/// - [`EtudeError::EmptySong`] when the duration covers no measures
/// - [`EtudeError::NoteOutOfRange`] when a note starts after the last measure
pub fn assemble(
    midi: &ParsedMidi,
    metadata: &SongMetadata,
    options: &IngestOptions,
) -> Result<SongEntry, EtudeError> {
    options.validate()?;

    let timeline = Timeline::from_midi(midi)?;
    let total_measures = timeline.measure_count();
    if total_measures == 0 {
        return Err(EtudeError::EmptySong {
            duration_seconds: midi.duration_seconds,
        });
    }

    let resolved = timeline.resolve(&midi.events)?;
    let separated = HandSeparator::new(options).separate(&resolved);
    let slices = slice_measures(&separated, total_measures, options.chord_tolerance_seconds())?;
    debug!(
        notes = separated.len(),
        measures = total_measures,
        "sliced performance"
    );

    for bar in metadata.annotations.keys().filter(|bar| **bar > total_measures) {
        warn!(bar, total_measures, "ignoring annotation past the end of the song");
    }

    let measures: Vec<Measure> = slices
        .into_iter()
        .map(|slice| {
            let annotation = metadata.annotations.get(&(slice.index + 1));
            build_measure(slice, &timeline, annotation)
        })
        .collect();

    let title = metadata
        .title
        .clone()
        .or_else(|| midi.track_names.iter().find(|n| !n.trim().is_empty()).cloned())
        .unwrap_or_else(|| "Untitled".to_string());
    let id = metadata.id.clone().unwrap_or_else(|| slugify(&title));
    let tempo = midi
        .tempo_changes
        .first()
        .and_then(|t| t.effective_bpm())
        .unwrap_or(DEFAULT_BPM);

    info!(%id, measures = total_measures, tempo, "assembled song");

    Ok(SongEntry {
        id,
        title,
        composer: metadata.composer.clone(),
        key: metadata.key.clone(),
        difficulty: metadata.difficulty,
        tempo,
        time_signature: timeline.signature_at(0),
        total_measures,
        duration_seconds: midi.duration_seconds,
        measures,
        key_moments: metadata.key_moments.clone(),
        musical_language: metadata.musical_language.clone(),
        track_names: midi.track_names.clone(),
    })
}

fn build_measure(
    slice: MeasureSlice,
    timeline: &Timeline,
    annotation: Option<&BarAnnotation>,
) -> Measure {
    let index = slice.index;
    let beats = timeline.measure_beats(index);
    let bpm = timeline.bpm_at_measure(index);

    let velocities: Vec<u8> = slice
        .left
        .chords
        .iter()
        .chain(slice.right.chords.iter())
        .flat_map(|c| c.notes.iter().map(|n| n.velocity))
        .collect();
    let derived_dynamics = if velocities.is_empty() {
        None
    } else {
        let mean = velocities.iter().map(|v| *v as f64).sum::<f64>() / velocities.len() as f64;
        Some(Dynamics::from_velocity(mean))
    };

    Measure {
        index,
        number: index + 1,
        left: slice.left.chords,
        right: slice.right.chords,
        teaching_note: annotation.and_then(|a| a.teaching_note.clone()),
        dynamics: annotation.and_then(|a| a.dynamics).or(derived_dynamics),
        beats,
        bpm,
        duration_seconds: beats * 60.0 / bpm,
        time_signature: timeline.signature_at(index),
    }
}

/// `"Für Elise (Op. 59)"` → `"f-r-elise-op-59"`
fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug.to_string()
    }
}
