//! Output connectors
//!
//! A connector receives note commands from exactly one session. The session owns it,
//! so there is never more than one writer.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConnectorError;
use crate::pitch::note_name;

pub trait OutputConnector {
    fn connect(&mut self) -> Result<(), ConnectorError>;
    fn disconnect(&mut self) -> Result<(), ConnectorError>;
    fn note_on(&mut self, note: u8, velocity: u8, channel: u8) -> Result<(), ConnectorError>;
    fn note_off(&mut self, note: u8, channel: u8) -> Result<(), ConnectorError>;
    fn is_connected(&self) -> bool;
}

/// One command as seen by [`RecordingConnector`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum ConnectorEvent {
    Connect,
    Disconnect,
    NoteOn { note: u8, velocity: u8, channel: u8 },
    NoteOff { note: u8, channel: u8 },
}

/// In-memory connector that logs every command
///
/// `fail_after(n)` makes the connector accept `n` more note commands and refuse the rest.
#[derive(Debug, Default)]
pub struct RecordingConnector {
    connected: bool,
    events: Vec<ConnectorEvent>,
    remaining_notes: Option<usize>,
}

impl RecordingConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A recording connector that is already connected
    pub fn connected() -> Self {
        Self {
            connected: true,
            ..Self::default()
        }
    }

    pub fn fail_after(mut self, notes: usize) -> Self {
        self.remaining_notes = Some(notes);
        self
    }

    pub fn events(&self) -> &[ConnectorEvent] {
        &self.events
    }

    pub fn note_ons(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, ConnectorEvent::NoteOn { .. }))
            .count()
    }

    pub fn note_offs(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, ConnectorEvent::NoteOff { .. }))
            .count()
    }

    fn record_note(&mut self, event: ConnectorEvent) -> Result<(), ConnectorError> {
        if !self.connected {
            return Err(ConnectorError::NotConnected);
        }
        if let Some(remaining) = self.remaining_notes.as_mut() {
            if *remaining == 0 {
                return Err(ConnectorError::Failed("injected failure".to_string()));
            }
            *remaining -= 1;
        }
        self.events.push(event);
        Ok(())
    }
}

impl OutputConnector for RecordingConnector {
    fn connect(&mut self) -> Result<(), ConnectorError> {
        self.connected = true;
        self.events.push(ConnectorEvent::Connect);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), ConnectorError> {
        self.connected = false;
        self.events.push(ConnectorEvent::Disconnect);
        Ok(())
    }

    fn note_on(&mut self, note: u8, velocity: u8, channel: u8) -> Result<(), ConnectorError> {
        self.record_note(ConnectorEvent::NoteOn {
            note,
            velocity,
            channel,
        })
    }

    fn note_off(&mut self, note: u8, channel: u8) -> Result<(), ConnectorError> {
        self.record_note(ConnectorEvent::NoteOff { note, channel })
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Connector that only logs, for running without an instrument
#[derive(Debug, Default)]
pub struct ConsoleConnector {
    connected: bool,
}

impl ConsoleConnector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputConnector for ConsoleConnector {
    fn connect(&mut self) -> Result<(), ConnectorError> {
        self.connected = true;
        info!("console output connected");
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), ConnectorError> {
        self.connected = false;
        info!("console output disconnected");
        Ok(())
    }

    fn note_on(&mut self, note: u8, velocity: u8, channel: u8) -> Result<(), ConnectorError> {
        if !self.connected {
            return Err(ConnectorError::NotConnected);
        }
        debug!(note = %note_name(note), velocity, channel, "note on");
        Ok(())
    }

    fn note_off(&mut self, note: u8, channel: u8) -> Result<(), ConnectorError> {
        if !self.connected {
            return Err(ConnectorError::NotConnected);
        }
        debug!(note = %note_name(note), channel, "note off");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
