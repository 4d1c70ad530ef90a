//! Playback session engine
//!
//! Paces a song's measures against a [`Clock`], sends note commands to the owned
//! connector and awaits teaching hooks at fixed points of each measure.
//!
//! Per measure:
//! 1. `on_measure_start(number, teaching_note, dynamics)`
//! 2. Note-ons in onset order, each note-off after its (tempo-scaled) duration
//! 3. For each key moment covering the bar: `on_key_moment(text)`, then `push(interjection)`
//!
//! After the final measure, `on_song_complete(measures_played, title)`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_std::channel::{self, Receiver, Sender};
use futures::future::{self, Either};
use tracing::{debug, info, trace, warn};

use crate::config::PlaybackOptions;
use crate::error::{ConnectorError, EtudeError, HookError, SessionError};
use crate::song::{Measure, SongEntry};

use super::clock::{Clock, SystemClock};
use super::connector::OutputConnector;
use super::hooks::TeachingHooks;
use super::key_moments::detect_key_moments;
use super::types::{Interjection, PlaybackMode, SessionSnapshot, SessionState};

/// Why a measure stopped early
enum Interrupt {
    Stopped,
    Failed(SessionError),
}

impl From<HookError> for Interrupt {
    fn from(e: HookError) -> Self {
        Interrupt::Failed(e.into())
    }
}

impl From<ConnectorError> for Interrupt {
    fn from(e: ConnectorError) -> Self {
        Interrupt::Failed(e.into())
    }
}

/// A note that has been switched on and not yet off
///
/// Times are seconds from the start of the measure being played; notes carried
/// over a barline have them shifted back by the previous measure's length.
#[derive(Debug, Clone, Copy)]
struct Sounding {
    note: u8,
    channel: u8,
    struck_at: f64,
    release_at: f64,
}

/// A scheduled note-on
#[derive(Debug, Clone, Copy)]
struct Cue {
    at: f64,
    length: f64,
    note: u8,
    velocity: u8,
    channel: u8,
}

/// Note-ons for one measure, in onset order with chord members adjacent
fn schedule(measure: &Measure, seconds_per_beat: f64) -> Vec<Cue> {
    measure
        .chords_in_order()
        .into_iter()
        .flat_map(|chord| {
            let at = chord.offset_beats * seconds_per_beat;
            chord.notes.iter().map(move |n| Cue {
                at,
                length: n.duration_beats * seconds_per_beat,
                note: n.note,
                velocity: n.velocity,
                channel: n.channel,
            })
        })
        .collect()
}

/// Reject songs whose timing cannot be paced
fn check_song(song: &SongEntry, tempo_scale: f64) -> Result<(), SessionError> {
    if song.measures.is_empty() {
        return Err(SessionError::InvalidSong(format!("\"{}\" has no measures", song.title)));
    }
    for measure in &song.measures {
        if !(measure.bpm.is_finite() && measure.bpm > 0.0) {
            return Err(SessionError::InvalidSong(format!(
                "bar {} has tempo {}",
                measure.number, measure.bpm
            )));
        }
        if !(measure.beats.is_finite() && measure.beats >= 0.0) {
            return Err(SessionError::InvalidSong(format!(
                "bar {} is {} beats long",
                measure.number, measure.beats
            )));
        }
        let seconds_per_beat = 60.0 / measure.bpm / tempo_scale;
        let mut span = measure.beats;
        for chord in measure.chords_in_order() {
            for note in &chord.notes {
                let (offset, duration) = (chord.offset_beats, note.duration_beats);
                if !(offset.is_finite() && offset >= 0.0 && duration.is_finite() && duration >= 0.0) {
                    return Err(SessionError::InvalidSong(format!(
                        "bar {} has {} at beat {} lasting {} beats",
                        measure.number, note.name, offset, duration
                    )));
                }
                span = span.max(offset + duration);
            }
        }
        if Duration::try_from_secs_f64(span * seconds_per_beat).is_err() {
            return Err(SessionError::InvalidSong(format!(
                "bar {} rings for {} seconds",
                measure.number,
                span * seconds_per_beat
            )));
        }
    }
    Ok(())
}

/// Controls a running session from another task or thread
#[derive(Debug, Clone)]
pub struct SessionHandle {
    stop_tx: Sender<()>,
    pause_requested: Arc<AtomicBool>,
}

impl SessionHandle {
    /// Cancel playback before the next scheduled emission
    pub fn stop(&self) {
        self.stop_tx.close();
    }

    /// Pause at the next measure boundary
    pub fn pause(&self) {
        self.pause_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop_tx.is_closed()
    }
}

/// One playback of one song
///
/// The song is borrowed and never modified, so any number of sessions can share
/// it. The connector is owned: one session, one writer.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use etude::session::{ManualClock, RecordingConnector, RecordingHooks, Session, SessionState};
/// # use etude::config::IngestOptions;
/// # use etude::ingest::{assemble, SongMetadata};
/// # use etude::midi::{ParsedMidi, RawNoteEvent};
/// # let midi = ParsedMidi {
/// #     events: vec![RawNoteEvent { note: 60, velocity: 80, time: 0.0, duration: 0.5, channel: 0 }],
/// #     tempo_changes: vec![],
/// #     time_signatures: vec![],
/// #     ticks_per_beat: 480,
/// #     format: 1,
/// #     duration_seconds: 4.0,
/// #     track_names: vec![],
/// # };
/// # let song = assemble(&midi, &SongMetadata::default(), &IngestOptions::default()).unwrap();
///
/// let mut session = Session::new(&song, RecordingConnector::new(), RecordingHooks::new())
///     .with_clock(Arc::new(ManualClock::new()));
/// session.connect().unwrap();
///
/// let state = futures::executor::block_on(session.play()).unwrap();
/// assert_eq!(state, SessionState::Finished);
/// assert_eq!(session.measures_played(), 2);
/// ```
pub struct Session<'s, C: OutputConnector, H: TeachingHooks> {
    song: &'s SongEntry,
    connector: C,
    hooks: H,
    clock: Arc<dyn Clock>,
    options: PlaybackOptions,
    state: SessionState,
    current_measure: usize,
    measures_played: usize,
    sounding: Vec<Sounding>,
    stop_tx: Sender<()>,
    stop_rx: Receiver<()>,
    pause_requested: Arc<AtomicBool>,
}

impl<'s, C: OutputConnector, H: TeachingHooks> Session<'s, C, H> {
    pub fn new(song: &'s SongEntry, connector: C, hooks: H) -> Self {
        let (stop_tx, stop_rx) = channel::bounded(1);
        Self {
            song,
            connector,
            hooks,
            clock: Arc::new(SystemClock),
            options: PlaybackOptions::default(),
            state: SessionState::Loaded,
            current_measure: 0,
            measures_played: 0,
            sounding: Vec::new(),
            stop_tx,
            stop_rx,
            pause_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_options(mut self, options: PlaybackOptions) -> Result<Self, EtudeError> {
        options.validate()?;
        self.options = options;
        Ok(self)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn set_mode(&mut self, mode: PlaybackMode) {
        self.options.mode = mode;
    }

    /// Connect the owned connector
    pub fn connect(&mut self) -> Result<(), SessionError> {
        self.connector.connect()?;
        Ok(())
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            stop_tx: self.stop_tx.clone(),
            pause_requested: self.pause_requested.clone(),
        }
    }

    pub fn song(&self) -> &'s SongEntry {
        self.song
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn mode(&self) -> PlaybackMode {
        self.options.mode
    }

    /// 0-based index of the next measure to play
    pub fn current_measure(&self) -> usize {
        self.current_measure
    }

    pub fn measures_played(&self) -> usize {
        self.measures_played
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn into_parts(self) -> (C, H) {
        (self.connector, self.hooks)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            song_id: self.song.id.clone(),
            state: self.state,
            mode: self.options.mode,
            current_measure: self.current_measure,
            measures_played: self.measures_played,
            total_measures: self.song.measures.len(),
        }
    }

    /// Play from the next unplayed measure
    ///
    /// Continuous mode plays to the end (or to a pause request); measure-by-measure
    /// mode plays one measure. Returns the state the session settled in. A stop
    /// request ends in `Ok(SessionState::Stopped)`.
    ///
    /// # Errors
    /// - [`SessionError::InvalidState`] once the session is finished or stopped
    /// - [`SessionError::NotConnected`] before the connector is connected
    /// - [`SessionError::Hook`] / [`SessionError::Connector`] when a collaborator fails;
    ///   the session is left paused at the failing measure, or loaded if nothing
    ///   had been played
    pub async fn play(&mut self) -> Result<SessionState, SessionError> {
        if self.state.is_terminal() {
            return Err(SessionError::InvalidState {
                state: self.state.to_string(),
                action: "play",
            });
        }
        if self.stop_rx.is_closed() {
            self.shutdown();
            return Ok(self.state);
        }
        if !self.connector.is_connected() {
            return Err(SessionError::NotConnected);
        }
        check_song(self.song, self.options.tempo_scale)?;

        let song = self.song;
        let total = song.measures.len();
        info!(song = %song.id, from = self.current_measure + 1, mode = ?self.options.mode, "playing");
        self.state = SessionState::Playing;

        while self.current_measure < total {
            let index = self.current_measure;
            match self.play_measure(index).await {
                Ok(()) => {}
                Err(Interrupt::Stopped) => {
                    self.shutdown();
                    return Ok(self.state);
                }
                Err(Interrupt::Failed(e)) => return Err(self.fail(e)),
            }
            self.current_measure += 1;
            self.measures_played += 1;

            let pause_requested = self.pause_requested.swap(false, Ordering::SeqCst);
            if self.current_measure < total
                && (self.options.mode == PlaybackMode::MeasureByMeasure || pause_requested)
            {
                self.release_sounding();
                self.state = SessionState::Paused;
                debug!(song = %song.id, measures_played = self.measures_played, "paused");
                return Ok(self.state);
            }
        }

        if self.stop_rx.is_closed() {
            self.shutdown();
            return Ok(self.state);
        }
        if let Err(e) = self
            .hooks
            .on_song_complete(self.measures_played, &song.title)
            .await
        {
            return Err(self.fail(e.into()));
        }
        self.state = SessionState::Finished;
        info!(song = %song.id, measures_played = self.measures_played, "finished");
        Ok(self.state)
    }

    /// Cancel: release sounding notes, disconnect, end in `Stopped`
    ///
    /// Never fails; connector errors while shutting down are logged.
    pub fn stop(&mut self) {
        if self.state != SessionState::Stopped {
            self.shutdown();
        }
    }

    async fn play_measure(&mut self, index: usize) -> Result<(), Interrupt> {
        let song = self.song;
        let Some(measure) = song.measure(index) else {
            return Ok(());
        };
        let seconds_per_beat = 60.0 / measure.bpm / self.options.tempo_scale;
        let length = measure.beats * seconds_per_beat;
        trace!(bar = measure.number, length, "measure");

        self.ensure_running()?;
        self.hooks
            .on_measure_start(
                measure.number,
                measure.teaching_note.as_deref(),
                measure.dynamics.map(|d| d.as_str()),
            )
            .await?;

        let mut elapsed = 0.0;
        for cue in schedule(measure, seconds_per_beat) {
            self.release_due(&mut elapsed, cue.at).await?;
            self.wait_until(&mut elapsed, cue.at).await?;
            self.connector.note_on(cue.note, cue.velocity, cue.channel)?;
            self.sounding.push(Sounding {
                note: cue.note,
                channel: cue.channel,
                struck_at: cue.at,
                release_at: cue.at + cue.length,
            });
        }

        if self.carries_over(index) {
            self.release_due(&mut elapsed, length).await?;
            self.wait_until(&mut elapsed, length).await?;
            for sounding in &mut self.sounding {
                sounding.struck_at -= length;
                sounding.release_at -= length;
            }
        } else {
            self.release_due(&mut elapsed, f64::INFINITY).await?;
            self.wait_until(&mut elapsed, length).await?;
        }

        for (moment, priority) in detect_key_moments(&song.key_moments, measure.number) {
            self.ensure_running()?;
            self.hooks.on_key_moment(&moment.text).await?;
            self.ensure_running()?;
            self.hooks
                .push(Interjection {
                    text: moment.text,
                    priority,
                })
                .await?;
        }
        Ok(())
    }

    /// Notes keep sounding into the next measure only in uninterrupted continuous play
    fn carries_over(&self, index: usize) -> bool {
        self.options.mode == PlaybackMode::Continuous
            && index + 1 < self.song.measures.len()
            && !self.pause_requested.load(Ordering::SeqCst)
    }

    /// Switch off, in release order, every note due by `until`
    ///
    /// A note struck at `until` is left alone so chord members all sound before
    /// any of them is released.
    async fn release_due(&mut self, elapsed: &mut f64, until: f64) -> Result<(), Interrupt> {
        loop {
            let next = self
                .sounding
                .iter()
                .enumerate()
                .filter(|(_, s)| s.release_at <= until && s.struck_at < until)
                .min_by(|a, b| a.1.release_at.total_cmp(&b.1.release_at))
                .map(|(i, s)| (i, s.release_at));
            let Some((i, release_at)) = next else {
                return Ok(());
            };
            self.wait_until(elapsed, release_at).await?;
            let sounding = self.sounding.remove(i);
            self.connector.note_off(sounding.note, sounding.channel)?;
        }
    }

    /// Suspend until `target` seconds into the measure, or until a stop request
    async fn wait_until(&self, elapsed: &mut f64, target: f64) -> Result<(), Interrupt> {
        self.ensure_running()?;
        let delay = target - *elapsed;
        if delay > 0.0 {
            let delay = Duration::try_from_secs_f64(delay).map_err(|_| {
                Interrupt::Failed(SessionError::InvalidSong(format!("cannot wait {} seconds", delay)))
            })?;
            let sleep = self.clock.sleep(delay);
            let stop = self.stop_rx.recv();
            futures::pin_mut!(stop);
            if let Either::Right(_) = future::select(sleep, stop).await {
                return Err(Interrupt::Stopped);
            }
            *elapsed = target;
        }
        Ok(())
    }

    fn ensure_running(&self) -> Result<(), Interrupt> {
        if self.stop_rx.is_closed() {
            Err(Interrupt::Stopped)
        } else {
            Ok(())
        }
    }

    /// Force note-off for everything still sounding
    fn release_sounding(&mut self) {
        for sounding in self.sounding.drain(..) {
            if let Err(e) = self.connector.note_off(sounding.note, sounding.channel) {
                warn!(note = sounding.note, error = %e, "forced note-off failed");
            }
        }
    }

    fn shutdown(&mut self) {
        self.release_sounding();
        self.stop_tx.close();
        if self.connector.is_connected() {
            if let Err(e) = self.connector.disconnect() {
                warn!(error = %e, "disconnect failed");
            }
        }
        self.state = SessionState::Stopped;
        info!(song = %self.song.id, measures_played = self.measures_played, "stopped");
    }

    /// Settle in the last stable state after a collaborator failure
    fn fail(&mut self, error: SessionError) -> SessionError {
        self.release_sounding();
        self.state = if self.measures_played == 0 {
            SessionState::Loaded
        } else {
            SessionState::Paused
        };
        warn!(
            song = %self.song.id,
            measure = self.current_measure + 1,
            state = %self.state,
            error = %error,
            "playback failed"
        );
        error
    }
}
