//! # Ingestion Module
//!
//! Turn a parsed MIDI performance into a hand-separated, measure-quantized [`SongEntry`].
//!
//! ## Purpose
//! A raw performance is a flat list of timed notes. Practice needs more structure:
//! 1. **Measures** - every note belongs to exactly one bar, located through the tempo and meter maps
//! 2. **Hands** - every note is labelled left or right
//! 3. **Chords** - near-simultaneous onsets on one hand are grouped
//!
//! ## Sub-modules
//! - `timeline` - Tempo map, meter map and note placement
//! - `hands` - Hand separation and chord grouping
//! - `slicer` - Per-measure buckets
//! - `assembler` - Full pipeline plus song metadata
//! - `batch` - Many songs with per-song failure isolation
//!
//! ## Entry Points
//! - [`assemble()`] - One performance to one song
//! - [`ingest_batch()`] / [`ingest_dir()`] - Many performances
//!
//! ## Example
//! ```rust
//! use etude::config::IngestOptions;
//! use etude::ingest::{assemble, SongMetadata};
//! use etude::midi::{ParsedMidi, RawNoteEvent, TempoSegment};
//!
//! let midi = ParsedMidi {
//!     events: vec![
//!         RawNoteEvent { note: 48, velocity: 70, time: 0.0, duration: 1.0, channel: 0 },
//!         RawNoteEvent { note: 64, velocity: 70, time: 0.0, duration: 0.5, channel: 0 },
//!         RawNoteEvent { note: 67, velocity: 70, time: 2.5, duration: 0.5, channel: 0 },
//!     ],
//!     tempo_changes: vec![TempoSegment::from_bpm(0.0, 120.0)],
//!     time_signatures: vec![],
//!     ticks_per_beat: 480,
//!     format: 1,
//!     duration_seconds: 4.0,
//!     track_names: vec![],
//! };
//!
//! let song = assemble(&midi, &SongMetadata::default(), &IngestOptions::default()).unwrap();
//!
//! assert_eq!(song.total_measures, 2); // 4 s at 120 BPM in 4/4
//! assert_eq!(song.measures[0].left[0].label(), "C3");
//! assert_eq!(song.measures[0].right[0].label(), "E4");
//! assert_eq!(song.measures[1].right[0].offset_beats, 1.0);
//! ```
//!
//! ## Timing
//!
//! Times arrive in seconds. Each onset is converted to the nearest whole tick using the
//! tempo map, and the tick is located on the meter map. Working in ticks keeps offsets
//! exact across tempo changes; a time signature change stated mid-measure takes effect at
//! the next barline.
//!
//! ## Related Modules
//! - `midi` - Input types
//! - `song` - Output types
//! - `config` - Split point, chord tolerance, channel hands

mod assembler;
mod batch;
mod hands;
mod slicer;
mod timeline;


pub use assembler::{assemble, BarAnnotation, SongMetadata};
pub use batch::{ingest_batch, ingest_dir, BatchInput, BatchReport};
pub use hands::{group_chords, regroup, HandSeparator};
pub use slicer::{slice_measures, MeasureSlice};
pub use timeline::{MeterMap, Position, TempoMap, Timeline};
