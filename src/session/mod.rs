//! # Session Module
//!
//! Play an assembled [`SongEntry`](crate::song::SongEntry) in real time, with teaching hooks.
//!
//! ## Sub-modules
//! - `types` - SessionState, PlaybackMode, Interjection, HookEvent, SessionSnapshot
//! - `engine` - The session state machine and pacing loop
//! - `hooks` - TeachingHooks and its console, silent, recording and callback variants
//! - `connector` - OutputConnector plus recording and console connectors
//! - `key_moments` - `"Bar N:"` / `"Bars N-M:"` matching
//! - `clock` - Wall-clock and virtual pacing
//!
//! ## States
//! A session starts `Loaded`. `play()` moves it to `Playing` and returns once it settles:
//! `Paused` (measure-by-measure mode, or a pause request), `Finished` after the last
//! measure, or `Stopped` after a stop request. A failing hook or connector returns an
//! error and leaves the session where it can be resumed.
//!
//! ## Concurrency
//! `play()` takes `&mut self`, so one session never processes two measures at once.
//! It suspends before every timed emission and during every hook call. A
//! [`SessionHandle`] obtained before playing can stop or pause it from elsewhere:
//!
//! ```rust
//! use std::sync::Arc;
//! use etude::session::{ManualClock, RecordingConnector, SilentHooks, Session, SessionState};
//! # use etude::config::IngestOptions;
//! # use etude::ingest::{assemble, SongMetadata};
//! # use etude::midi::{ParsedMidi, RawNoteEvent};
//! # let midi = ParsedMidi {
//! #     events: vec![RawNoteEvent { note: 60, velocity: 80, time: 0.0, duration: 0.5, channel: 0 }],
//! #     tempo_changes: vec![],
//! #     time_signatures: vec![],
//! #     ticks_per_beat: 480,
//! #     format: 1,
//! #     duration_seconds: 8.0,
//! #     track_names: vec![],
//! # };
//! # let song = assemble(&midi, &SongMetadata::default(), &IngestOptions::default()).unwrap();
//!
//! let mut session = Session::new(&song, RecordingConnector::connected(), SilentHooks)
//!     .with_clock(Arc::new(ManualClock::new()));
//! let handle = session.handle();
//!
//! handle.stop();
//! let state = futures::executor::block_on(session.play()).unwrap();
//! assert_eq!(state, SessionState::Stopped);
//! assert_eq!(session.measures_played(), 0);
//! ```
//!
//! ## Related Modules
//! - `ingest` - Produces the songs played here
//! - `config` - PlaybackOptions (mode, tempo scale)

mod clock;
mod connector;
mod engine;
mod hooks;
mod key_moments;
mod types;


pub use clock::{Clock, ManualClock, SystemClock};
pub use connector::{ConnectorEvent, ConsoleConnector, OutputConnector, RecordingConnector};
pub use engine::{Session, SessionHandle};
pub use hooks::{CallbackHooks, ConsoleHooks, RecordingHooks, SilentHooks, TeachingHooks};
pub use key_moments::{detect_key_moments, KeyMoment};
pub use types::{HookEvent, Interjection, PlaybackMode, Priority, SessionSnapshot, SessionState};
