//! Batch ingestion
//!
//! Songs are assembled independently: one malformed performance is recorded as a
//! failure and the rest of the batch carries on.

use std::fs;
use std::path::Path;

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::IngestOptions;
use crate::error::EtudeError;
use crate::midi::ParsedMidi;
use crate::song::SongEntry;

use super::assembler::{assemble, SongMetadata};

/// One performance to ingest
#[derive(Debug, Clone)]
pub struct BatchInput {
    /// Label used in failure reports (usually the file stem)
    pub name: String,
    pub midi: ParsedMidi,
    pub metadata: SongMetadata,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub songs: Vec<SongEntry>,
    pub failures: Vec<(String, EtudeError)>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, name: String, result: Result<SongEntry, EtudeError>) {
        match result {
            Ok(song) => self.songs.push(song),
            Err(e) => {
                warn!(song = %name, error = %e, "skipping song");
                self.failures.push((name, e));
            }
        }
    }
}

pub fn ingest_batch(inputs: &[BatchInput], options: &IngestOptions) -> BatchReport {
    let mut report = BatchReport::default();
    for input in inputs {
        let result = assemble(&input.midi, &input.metadata, options);
        report.record(input.name.clone(), result);
    }
    info!(
        songs = report.songs.len(),
        failures = report.failures.len(),
        "batch complete"
    );
    report
}

/// Ingest every `*.json` performance under `dir`
///
/// A `<stem>.yaml` file next to a performance is read as its metadata. Files are
/// visited in name order. Unreadable files count as failures of that song only;
/// a missing or unreadable `dir` is the one error that aborts the batch.
pub fn ingest_dir(dir: impl AsRef<Path>, options: &IngestOptions) -> Result<BatchReport, EtudeError> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(EtudeError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} is not a directory", dir.display()),
        )));
    }

    let mut report = BatchReport::default();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("json")
        {
            continue;
        }

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unnamed")
            .to_string();
        let result = load_song(path)
            .and_then(|(midi, metadata)| assemble(&midi, &metadata, options));
        report.record(name, result);
    }

    info!(
        dir = %dir.display(),
        songs = report.songs.len(),
        failures = report.failures.len(),
        "directory ingested"
    );
    Ok(report)
}

fn load_song(path: &Path) -> Result<(ParsedMidi, SongMetadata), EtudeError> {
    let midi = ParsedMidi::from_json(&fs::read_to_string(path)?)?;
    let sidecar = path.with_extension("yaml");
    let metadata = if sidecar.is_file() {
        SongMetadata::load(&sidecar)?
    } else {
        SongMetadata::default()
    };
    Ok((midi, metadata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::{RawNoteEvent, TempoSegment};

    fn performance(duration_seconds: f64) -> ParsedMidi {
        ParsedMidi {
            events: vec![RawNoteEvent {
                note: 60,
                velocity: 80,
                time: 0.0,
                duration: 0.5,
                channel: 0,
            }],
            tempo_changes: vec![TempoSegment::from_bpm(0.0, 120.0)],
            time_signatures: vec![],
            ticks_per_beat: 480,
            format: 1,
            duration_seconds,
            track_names: vec![],
        }
    }

    fn input(name: &str, midi: ParsedMidi) -> BatchInput {
        BatchInput {
            name: name.to_string(),
            midi,
            metadata: SongMetadata {
                title: Some(name.to_string()),
                ..SongMetadata::default()
            },
        }
    }

    #[test]
    fn test_failure_does_not_abort_batch() {
        let inputs = vec![
            input("first", performance(4.0)),
            input("empty", performance(0.0)),
            input("third", performance(8.0)),
        ];
        let report = ingest_batch(&inputs, &IngestOptions::default());

        assert_eq!(report.songs.len(), 2);
        assert_eq!(report.songs[0].id, "first");
        assert_eq!(report.songs[1].total_measures, 4);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "empty");
        assert!(matches!(report.failures[0].1, EtudeError::EmptySong { .. }));
        assert!(!report.is_clean());
    }

    #[test]
    fn test_ingest_dir_reads_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        let json = serde_json::to_string(&performance(4.0)).unwrap();
        fs::write(dir.path().join("a_minuet.json"), &json).unwrap();
        fs::write(dir.path().join("a_minuet.yaml"), "title: Minuet\nkey: G\n").unwrap();
        fs::write(dir.path().join("b_plain.json"), &json).unwrap();
        fs::write(dir.path().join("c_broken.json"), "{ not json").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let report = ingest_dir(dir.path(), &IngestOptions::default()).unwrap();

        assert_eq!(report.songs.len(), 2);
        assert_eq!(report.songs[0].title, "Minuet");
        assert_eq!(report.songs[0].key.as_deref(), Some("G"));
        assert_eq!(report.songs[1].title, "Untitled");
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "c_broken");
        assert!(matches!(report.failures[0].1, EtudeError::Json(_)));
    }

    #[test]
    fn test_ingest_dir_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = ingest_dir(dir.path().join("nope"), &IngestOptions::default());
        assert!(matches!(result, Err(EtudeError::Io(_))));
    }
}
