//! Integration tests for etude
//!
//! Tests the full pipeline from a parsed performance (JSON) to a played session.

use std::sync::Arc;

use etude::ingest::{ingest_dir, SongMetadata};
use etude::session::{
    ConnectorEvent, HookEvent, ManualClock, Priority, RecordingConnector, RecordingHooks,
};
use etude::{
    ingest_json, ingest_json_default, EtudeConfig, EtudeError, IngestOptions, PlaybackMode,
    Session, SessionState, SongEntry,
};

const MINUET: &str = r#"{
  "events": [
    { "note": 67, "velocity": 72, "time": 0.0, "duration": 0.45, "channel": 0 },
    { "note": 43, "velocity": 60, "time": 0.0, "duration": 1.4, "channel": 1 },
    { "note": 47, "velocity": 60, "time": 0.0, "duration": 1.4, "channel": 1 },
    { "note": 60, "velocity": 70, "time": 0.5, "duration": 0.2, "channel": 0 },
    { "note": 62, "velocity": 70, "time": 0.75, "duration": 0.2, "channel": 0 },
    { "note": 64, "velocity": 74, "time": 1.0, "duration": 0.2, "channel": 0 },
    { "note": 66, "velocity": 74, "time": 1.25, "duration": 0.2, "channel": 0 },
    { "note": 67, "velocity": 80, "time": 1.5, "duration": 0.45, "channel": 0 },
    { "note": 48, "velocity": 62, "time": 1.5, "duration": 1.4, "channel": 1 },
    { "note": 60, "velocity": 78, "time": 2.0, "duration": 0.45, "channel": 0 },
    { "note": 60, "velocity": 78, "time": 2.5, "duration": 0.45, "channel": 0 },
    { "note": 47, "velocity": 62, "time": 3.0, "duration": 1.4, "channel": 1 },
    { "note": 64, "velocity": 90, "time": 3.0, "duration": 0.45, "channel": 0 },
    { "note": 72, "velocity": 0, "time": 3.2, "duration": 0.0, "channel": 0 },
    { "note": 60, "velocity": 88, "time": 3.5, "duration": 0.2, "channel": 0 },
    { "note": 67, "velocity": 88, "time": 4.5, "duration": 1.3, "channel": 0 },
    { "note": 43, "velocity": 64, "time": 4.5, "duration": 1.4, "channel": 1 }
  ],
  "tempoChanges": [ { "time": 0.0, "bpm": 120.0, "microsecondsPerBeat": 500000 } ],
  "timeSignatures": [ { "ticks": 0, "numerator": 3, "denominator": 4 } ],
  "ticksPerBeat": 480,
  "format": 1,
  "durationSeconds": 6.0,
  "trackNames": ["Right", "Left"]
}"#;

const MINUET_META: &str = r#"
title: Minuet in G
composer: Petzold
key: G
difficulty: 2
key-moments:
  - "Bar 1: Settle the three-beat pulse"
  - "Bars 3-4: Let the line rise"
  - "Remember to breathe"
musical-language:
  description: A light court dance
  style-tips: ["Lean on beat one"]
annotations:
  2:
    teaching-note: Even eighths
"#;

fn minuet() -> SongEntry {
    ingest_json(MINUET, Some(MINUET_META), &IngestOptions::default()).unwrap()
}

#[test]
fn test_ingest_minuet() {
    let song = minuet();

    assert_eq!(song.id, "minuet-in-g");
    assert_eq!(song.total_measures, 4); // 6 s of 3/4 at 120 BPM
    assert_eq!(song.time_signature.to_string(), "3/4");
    assert_eq!(song.tempo, 120.0);
    assert_eq!(song.key.as_deref(), Some("G"));
    assert_eq!(song.musical_language.style_tips, vec!["Lean on beat one"]);

    // Channel 1 is the left hand even though the melody sits near middle C
    let first = &song.measures[0];
    assert_eq!(first.left.len(), 1);
    assert_eq!(first.left[0].label(), "G2+B2");
    let melody: Vec<String> = first.right.iter().map(|c| c.label()).collect();
    assert_eq!(melody, vec!["G4", "C4", "D4", "E4", "F#4"]);

    assert_eq!(song.measures[1].teaching_note.as_deref(), Some("Even eighths"));
    // The velocity-0 marker is not a note
    assert!(song.measures[2]
        .right
        .iter()
        .all(|c| !c.pitches().contains(&72)));
}

#[test]
fn test_ingestion_is_deterministic() {
    assert_eq!(minuet(), minuet());
}

#[test]
fn test_ingest_errors_are_descriptive() {
    let empty = r#"{ "events": [], "ticksPerBeat": 480, "durationSeconds": 0.0 }"#;
    let err = ingest_json_default(empty).unwrap_err();
    assert!(matches!(err, EtudeError::EmptySong { .. }));
    assert_eq!(err.to_string(), "Song has no measures (duration 0.000s)");

    let err = ingest_json_default("{ \"events\": 3 }").unwrap_err();
    assert!(matches!(err, EtudeError::Json(_)));

    let bad_meter = r#"{
      "events": [],
      "timeSignatures": [ { "ticks": 0, "numerator": 3, "denominator": 5 } ],
      "ticksPerBeat": 480,
      "durationSeconds": 4.0
    }"#;
    assert!(matches!(
        ingest_json_default(bad_meter),
        Err(EtudeError::Timeline(_))
    ));
}

#[test]
fn test_play_minuet_continuous() {
    let song = minuet();
    let clock = Arc::new(ManualClock::new());
    let mut session = Session::new(&song, RecordingConnector::new(), RecordingHooks::new())
        .with_clock(clock.clone());
    session.connect().unwrap();

    let state = futures::executor::block_on(session.play()).unwrap();
    assert_eq!(state, SessionState::Finished);
    assert_eq!(session.measures_played(), 4);
    assert!((clock.elapsed().as_secs_f64() - 6.0).abs() < 1e-3);

    let (connector, hooks) = session.into_parts();
    let note_count: usize = song.measures.iter().map(|m| m.note_count()).sum();
    let ons = connector
        .events()
        .iter()
        .filter(|e| matches!(e, ConnectorEvent::NoteOn { .. }))
        .count();
    assert_eq!(ons, note_count);
    assert_eq!(connector.note_offs(), note_count);

    let events = hooks.into_events();
    let interjections: Vec<Priority> = events
        .iter()
        .filter_map(|e| match e {
            HookEvent::Interjection(i) => Some(i.priority),
            _ => None,
        })
        .collect();
    assert_eq!(interjections, vec![Priority::High, Priority::High, Priority::Med]);
    assert_eq!(
        events.last(),
        Some(&HookEvent::SongComplete {
            measures_played: 4,
            title: "Minuet in G".to_string(),
        })
    );
}

#[test]
fn test_play_minuet_measure_by_measure_from_config() {
    let config = EtudeConfig::from_yaml("playback:\n  mode: measure-by-measure\n").unwrap();
    let song = minuet();
    let mut session = Session::new(&song, RecordingConnector::connected(), RecordingHooks::new())
        .with_clock(Arc::new(ManualClock::new()))
        .with_options(config.playback)
        .unwrap();
    assert_eq!(session.mode(), PlaybackMode::MeasureByMeasure);

    let mut states = Vec::new();
    for _ in 0..4 {
        states.push(futures::executor::block_on(session.play()).unwrap());
    }
    assert_eq!(
        states,
        vec![
            SessionState::Paused,
            SessionState::Paused,
            SessionState::Paused,
            SessionState::Finished
        ]
    );
}

#[test]
fn test_song_json_survives_storage() {
    let song = minuet();
    let stored = song.to_json_pretty().unwrap();
    let loaded = SongEntry::from_json(&stored).unwrap();
    assert_eq!(loaded, song);
}

#[test]
fn test_batch_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("minuet.json"), MINUET).unwrap();
    std::fs::write(dir.path().join("minuet.yaml"), MINUET_META).unwrap();
    std::fs::write(dir.path().join("broken.json"), "[]").unwrap();

    let report = ingest_dir(dir.path(), &IngestOptions::default()).unwrap();
    assert_eq!(report.songs.len(), 1);
    assert_eq!(report.songs[0], minuet());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "broken");

    // Metadata alone is not a song
    assert_eq!(SongMetadata::from_yaml(MINUET_META).unwrap().key_moments.len(), 3);
}
