//! Teaching hooks
//!
//! The session calls these at fixed points of every measure and awaits each call
//! before moving on, so a slow hook delays playback and a failing hook stops it.
//!
//! ## Variants
//! - [`ConsoleHooks`] - Prints to stdout and logs through `tracing`
//! - [`SilentHooks`] - Does nothing
//! - [`RecordingHooks`] - Keeps every call as a [`HookEvent`]
//! - [`CallbackHooks`] - Hands every call to a closure, which may fail

use std::fmt;

use futures::future::{self, BoxFuture};
use futures::FutureExt;
use tracing::info;

use crate::error::HookError;

use super::types::{HookEvent, Interjection, Priority};

pub trait TeachingHooks: Send {
    fn on_measure_start<'a>(
        &'a mut self,
        number: usize,
        teaching_note: Option<&'a str>,
        dynamics: Option<&'a str>,
    ) -> BoxFuture<'a, Result<(), HookError>>;

    fn on_key_moment<'a>(&'a mut self, text: &'a str) -> BoxFuture<'a, Result<(), HookError>>;

    fn on_song_complete<'a>(
        &'a mut self,
        measures_played: usize,
        title: &'a str,
    ) -> BoxFuture<'a, Result<(), HookError>>;

    fn push(&mut self, interjection: Interjection) -> BoxFuture<'_, Result<(), HookError>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleHooks;

impl TeachingHooks for ConsoleHooks {
    fn on_measure_start<'a>(
        &'a mut self,
        number: usize,
        teaching_note: Option<&'a str>,
        dynamics: Option<&'a str>,
    ) -> BoxFuture<'a, Result<(), HookError>> {
        async move {
            info!(measure = number, ?teaching_note, ?dynamics, "measure start");
            let mut line = format!("Bar {}", number);
            if let Some(dynamics) = dynamics {
                line.push_str(&format!(" [{}]", dynamics));
            }
            if let Some(note) = teaching_note {
                line.push_str(&format!(": {}", note));
            }
            println!("{}", line);
            Ok(())
        }
        .boxed()
    }

    fn on_key_moment<'a>(&'a mut self, text: &'a str) -> BoxFuture<'a, Result<(), HookError>> {
        async move {
            info!(text, "key moment");
            Ok(())
        }
        .boxed()
    }

    fn on_song_complete<'a>(
        &'a mut self,
        measures_played: usize,
        title: &'a str,
    ) -> BoxFuture<'a, Result<(), HookError>> {
        async move {
            info!(measures_played, title, "song complete");
            println!("Finished \"{}\" ({} bars)", title, measures_played);
            Ok(())
        }
        .boxed()
    }

    fn push(&mut self, interjection: Interjection) -> BoxFuture<'_, Result<(), HookError>> {
        async move {
            let marker = match interjection.priority {
                Priority::High => "!!",
                Priority::Med => "!",
                Priority::Low => "-",
            };
            println!("  {} {}", marker, interjection.text);
            Ok(())
        }
        .boxed()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SilentHooks;

impl TeachingHooks for SilentHooks {
    fn on_measure_start<'a>(
        &'a mut self,
        _number: usize,
        _teaching_note: Option<&'a str>,
        _dynamics: Option<&'a str>,
    ) -> BoxFuture<'a, Result<(), HookError>> {
        future::ok(()).boxed()
    }

    fn on_key_moment<'a>(&'a mut self, _text: &'a str) -> BoxFuture<'a, Result<(), HookError>> {
        future::ok(()).boxed()
    }

    fn on_song_complete<'a>(
        &'a mut self,
        _measures_played: usize,
        _title: &'a str,
    ) -> BoxFuture<'a, Result<(), HookError>> {
        future::ok(()).boxed()
    }

    fn push(&mut self, _interjection: Interjection) -> BoxFuture<'_, Result<(), HookError>> {
        future::ok(()).boxed()
    }
}

#[derive(Debug, Default, Clone)]
pub struct RecordingHooks {
    events: Vec<HookEvent>,
}

impl RecordingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[HookEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<HookEvent> {
        self.events
    }

    fn record(&mut self, event: HookEvent) -> BoxFuture<'_, Result<(), HookError>> {
        self.events.push(event);
        future::ok(()).boxed()
    }
}

impl TeachingHooks for RecordingHooks {
    fn on_measure_start<'a>(
        &'a mut self,
        number: usize,
        teaching_note: Option<&'a str>,
        dynamics: Option<&'a str>,
    ) -> BoxFuture<'a, Result<(), HookError>> {
        self.record(HookEvent::MeasureStart {
            number,
            teaching_note: teaching_note.map(str::to_string),
            dynamics: dynamics.map(str::to_string),
        })
    }

    fn on_key_moment<'a>(&'a mut self, text: &'a str) -> BoxFuture<'a, Result<(), HookError>> {
        self.record(HookEvent::KeyMoment {
            text: text.to_string(),
        })
    }

    fn on_song_complete<'a>(
        &'a mut self,
        measures_played: usize,
        title: &'a str,
    ) -> BoxFuture<'a, Result<(), HookError>> {
        self.record(HookEvent::SongComplete {
            measures_played,
            title: title.to_string(),
        })
    }

    fn push(&mut self, interjection: Interjection) -> BoxFuture<'_, Result<(), HookError>> {
        self.record(HookEvent::Interjection(interjection))
    }
}

type HookCallback = Box<dyn FnMut(HookEvent) -> Result<(), HookError> + Send>;

/// Routes every hook call to a closure
///
/// ```
/// use etude::session::{CallbackHooks, HookEvent};
/// use etude::HookError;
///
/// let hooks = CallbackHooks::new(|event| match event {
///     HookEvent::MeasureStart { number: 13, .. } => Err(HookError::new("unlucky bar")),
///     _ => Ok(()),
/// });
/// # drop(hooks);
/// ```
pub struct CallbackHooks {
    callback: HookCallback,
}

impl CallbackHooks {
    pub fn new(callback: impl FnMut(HookEvent) -> Result<(), HookError> + Send + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    fn call(&mut self, event: HookEvent) -> BoxFuture<'_, Result<(), HookError>> {
        future::ready((self.callback)(event)).boxed()
    }
}

impl fmt::Debug for CallbackHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackHooks").finish_non_exhaustive()
    }
}

impl TeachingHooks for CallbackHooks {
    fn on_measure_start<'a>(
        &'a mut self,
        number: usize,
        teaching_note: Option<&'a str>,
        dynamics: Option<&'a str>,
    ) -> BoxFuture<'a, Result<(), HookError>> {
        self.call(HookEvent::MeasureStart {
            number,
            teaching_note: teaching_note.map(str::to_string),
            dynamics: dynamics.map(str::to_string),
        })
    }

    fn on_key_moment<'a>(&'a mut self, text: &'a str) -> BoxFuture<'a, Result<(), HookError>> {
        self.call(HookEvent::KeyMoment {
            text: text.to_string(),
        })
    }

    fn on_song_complete<'a>(
        &'a mut self,
        measures_played: usize,
        title: &'a str,
    ) -> BoxFuture<'a, Result<(), HookError>> {
        self.call(HookEvent::SongComplete {
            measures_played,
            title: title.to_string(),
        })
    }

    fn push(&mut self, interjection: Interjection) -> BoxFuture<'_, Result<(), HookError>> {
        self.call(HookEvent::Interjection(interjection))
    }
}
