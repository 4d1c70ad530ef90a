//! # Error Types
//!
//! This module defines all error types for ingestion and playback.
//!
//! Ingestion errors carry enough context (measure index, event index, field name)
//! to point at the offending part of a `ParsedMidi` input. Playback errors describe
//! the session-level failure; the session itself stays in its last stable state.
//!
//! ## Error Types
//! - [`EtudeError`] - Ingestion failures (malformed input, empty songs, out-of-range notes)
//! - [`SessionError`] - Playback failures (not connected, invalid transition, collaborator failure)
//! - [`HookError`] - A teaching hook reported a failure
//! - [`ConnectorError`] - The output connector refused a command
//!
//! ## Usage
//! ```rust,ignore
//! use etude::{ingest, EtudeError};
//!
//! match ingest::assemble(&midi, &metadata, &options) {
//!     Ok(song) => println!("{} measures", song.total_measures),
//!     Err(EtudeError::NoteOutOfRange { measure, total }) => {
//!         eprintln!("note lands in measure {} but the song has {}", measure, total);
//!     }
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtudeError {
    /// A raw event or header field is out of range.
    ///
    /// # Example
    /// ```
    /// # use etude::EtudeError;
    /// let err = EtudeError::InvalidInput {
    ///     index: 3,
    ///     message: "note 130 is outside 0..=127".to_string(),
    /// };
    /// assert_eq!(err.to_string(), "Invalid input at event 3: note 130 is outside 0..=127");
    /// ```
    #[error("Invalid input at event {index}: {message}")]
    InvalidInput { index: usize, message: String },

    /// The tempo or time-signature timeline is malformed.
    ///
    /// # Example
    /// ```
    /// # use etude::EtudeError;
    /// let err = EtudeError::Timeline("ticks per beat must be positive".to_string());
    /// assert_eq!(err.to_string(), "Invalid timeline: ticks per beat must be positive");
    /// ```
    #[error("Invalid timeline: {0}")]
    Timeline(String),

    /// Slicing produced no measures at all.
    #[error("Song has no measures (duration {duration_seconds:.3}s)")]
    EmptySong { duration_seconds: f64 },

    /// A note resolved to a measure past the end of the song.
    ///
    /// # Example
    /// ```
    /// # use etude::EtudeError;
    /// let err = EtudeError::NoteOutOfRange { measure: 12, total: 12 };
    /// assert_eq!(err.to_string(), "Note resolved to measure 12 but the song has 12 measures");
    /// ```
    #[error("Note resolved to measure {measure} but the song has {total} measures")]
    NoteOutOfRange { measure: usize, total: usize },

    /// Song metadata (sidecar YAML) is inconsistent.
    #[error("Invalid metadata: {0}")]
    Metadata(String),

    /// Configuration values are out of range.
    ///
    /// # Example
    /// ```
    /// # use etude::EtudeError;
    /// let err = EtudeError::Config("tempo-scale must be positive".to_string());
    /// assert_eq!(err.to_string(), "Invalid configuration: tempo-scale must be positive");
    /// ```
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// A teaching hook failed. Hooks sit on the timing path, so the session
/// surfaces this instead of swallowing it.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Teaching hook failed: {0}")]
pub struct HookError(pub String);

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectorError {
    #[error("Output connector is not connected")]
    NotConnected,

    #[error("Output connector failed: {0}")]
    Failed(String),
}

#[derive(Error, Debug)]
pub enum SessionError {
    /// `play()` was called before the connector was connected.
    #[error("Cannot play: output connector is not connected")]
    NotConnected,

    /// The requested action is not valid in the current state.
    ///
    /// # Example
    /// ```
    /// # use etude::SessionError;
    /// let err = SessionError::InvalidState {
    ///     state: "finished".to_string(),
    ///     action: "play",
    /// };
    /// assert_eq!(err.to_string(), "Cannot play while the session is finished");
    /// ```
    #[error("Cannot {action} while the session is {state}")]
    InvalidState { state: String, action: &'static str },

    /// The song cannot be paced (no measures, or a measure without a usable tempo).
    #[error("Song cannot be played: {0}")]
    InvalidSong(String),

    #[error(transparent)]
    Hook(#[from] HookError),

    #[error(transparent)]
    Connector(#[from] ConnectorError),
}
