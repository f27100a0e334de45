//! The seam between the player state machine and whatever actually makes sound.
//!
//! Backends are driven with commands and report back asynchronously through the
//! [`BackendEvent`] channel they were created with.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("no audio output is available: {0}")]
    Unavailable(String),
    #[error("failed to load the song: {0}")]
    Load(String),
    #[error("failed to start playback: {0}")]
    Playback(String),
}

/// Reported by a backend, in the order things happened.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    /// The last loaded source is ready to play.
    CanPlay { duration: Option<Duration> },
    /// The last loaded source could not be fetched or decoded.
    LoadFailed(String),
    /// Playback of the current source reached its end.
    Ended,
    /// Where playback currently is.
    Progress { position: Duration },
}

pub trait AudioBackend: Send {
    /// Start loading `url`, replacing whatever was loaded before.
    ///
    /// # Errors
    ///
    /// Returns an error if loading could not even be started.
    fn load(&mut self, url: &str) -> Result<(), BackendError>;

    /// Start or resume playback of the loaded source.
    ///
    /// # Errors
    ///
    /// Returns an error if the output refuses to play.
    fn play(&mut self) -> Result<(), BackendError>;

    fn pause(&mut self);

    /// Stop playback and drop the loaded source.
    fn stop(&mut self);

    fn seek(&mut self, position: Duration);

    /// `volume` is in `0.0..=1.0`.
    fn set_volume(&mut self, volume: f32);
}

/// Everything a [`MockBackend`] was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Load(String),
    Play,
    Pause,
    Stop,
    Seek(Duration),
    SetVolume(f32),
}

/// A backend that makes no sound, records its calls, and can be told to fail loads.
///
/// When created with an event sender it answers every load right away, like a source that
/// is already buffered.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    calls: Arc<Mutex<Vec<BackendCall>>>,
    failing_loads: Arc<AtomicUsize>,
    events: Option<UnboundedSender<BackendEvent>>,
    duration: Option<Duration>,
}

impl MockBackend {
    /// A backend that leaves reporting events to the caller.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend that reports load results through `events` by itself.
    #[must_use]
    pub fn with_events(events: UnboundedSender<BackendEvent>) -> Self {
        Self {
            events: Some(events),
            duration: Some(Duration::from_secs(180)),
            ..Self::default()
        }
    }

    /// Make the next `n` loads fail.
    pub fn fail_next_loads(&self, n: usize) {
        self.failing_loads.store(n, Ordering::SeqCst);
    }

    #[must_use]
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    /// The urls that were loaded, in order.
    #[must_use]
    pub fn loads(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::Load(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: BackendCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl AudioBackend for MockBackend {
    fn load(&mut self, url: &str) -> Result<(), BackendError> {
        self.record(BackendCall::Load(url.to_string()));
        let fail = self
            .failing_loads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if let Some(events) = &self.events {
            let event = if fail {
                BackendEvent::LoadFailed(format!("could not load {url}"))
            } else {
                BackendEvent::CanPlay {
                    duration: self.duration,
                }
            };
            let _ = events.send(event);
        }
        Ok(())
    }

    fn play(&mut self) -> Result<(), BackendError> {
        self.record(BackendCall::Play);
        Ok(())
    }

    fn pause(&mut self) {
        self.record(BackendCall::Pause);
    }

    fn stop(&mut self) {
        self.record(BackendCall::Stop);
    }

    fn seek(&mut self, position: Duration) {
        self.record(BackendCall::Seek(position));
    }

    fn set_volume(&mut self, volume: f32) {
        self.record(BackendCall::SetVolume(volume));
    }
}
