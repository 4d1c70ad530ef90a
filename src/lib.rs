pub mod config;
pub mod error;
pub mod ingest;
pub mod midi;
pub mod pitch;
pub mod session;
pub mod song;

pub use config::{EtudeConfig, IngestOptions, PlaybackOptions};
pub use error::*;
pub use ingest::{assemble, SongMetadata};
pub use midi::ParsedMidi;
pub use session::{PlaybackMode, Session, SessionState};
pub use song::SongEntry;

/// Ingest a parsed performance given as JSON, with optional YAML metadata.
/// This is the main entry point for the library.
pub fn ingest_json(
    midi_json: &str,
    metadata_yaml: Option<&str>,
    options: &IngestOptions,
) -> Result<SongEntry, EtudeError> {
    let midi = ParsedMidi::from_json(midi_json)?;
    let metadata = match metadata_yaml {
        Some(yaml) => SongMetadata::from_yaml(yaml)?,
        None => SongMetadata::default(),
    };
    assemble(&midi, &metadata, options)
}

/// Ingest with default options
pub fn ingest_json_default(midi_json: &str) -> Result<SongEntry, EtudeError> {
    ingest_json(midi_json, None, &IngestOptions::default())
}
