//! The client side player: which song is current, what the audio output is doing, and how
//! both react to the user and to the backend.
//!
//! [`Player`] is a plain state machine, it never sleeps. Anything that has to happen later is
//! returned as a [`Followup`] for the [`controller`] to schedule.

//----------------------------------------------------------------------------------------- std lib
use std::time::Duration;
//--------------------------------------------------------------------------------- other libraries
use log::{debug, info, warn};
//------------------------------------------------------------------------------- SONGBOX libraries
use songbox_core::{config::ClientSettings, format_duration};
use songbox_storage::db::schemas::song::{Song, public_path};

pub mod backend;
pub mod controller;
pub mod debounce;
#[cfg(feature = "audio")]
pub mod rodio_backend;

use crate::notification::Notification;
use backend::{AudioBackend, BackendEvent};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlayerError {
    #[error("there is no song number {}, the list has {len}", .index + 1)]
    OutOfRange { index: usize, len: usize },
    #[error("the song list is empty")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    #[default]
    Idle,
    /// Waiting for the backend, `attempt` counts the reloads after a failure.
    Loading { attempt: u32 },
    Playing,
    Paused,
    /// Gave up on the current song.
    Failed(String),
}

/// How loud things are, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeLevel {
    Muted,
    Low,
    High,
}

impl VolumeLevel {
    #[must_use]
    pub fn of(volume: f32) -> Self {
        if volume <= 0.0 {
            Self::Muted
        } else if volume < 0.5 {
            Self::Low
        } else {
            Self::High
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub songs: Vec<Song>,
    pub current_index: Option<usize>,
    pub status: PlaybackStatus,
    pub position: Duration,
    pub duration: Option<Duration>,
    pub volume: f32,
    /// Whether the player should be shown at all.
    pub visible: bool,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            songs: Vec::new(),
            current_index: None,
            status: PlaybackStatus::Idle,
            position: Duration::ZERO,
            duration: None,
            volume: 1.0,
            visible: false,
        }
    }
}

impl PlayerState {
    #[must_use]
    pub fn current_song(&self) -> Option<&Song> {
        self.current_index.and_then(|i| self.songs.get(i))
    }

    #[must_use]
    pub fn volume_level(&self) -> VolumeLevel {
        VolumeLevel::of(self.volume)
    }

    /// `position / duration` as `m:ss / m:ss`, the duration is `0:00` while unknown.
    #[must_use]
    pub fn progress_label(&self) -> String {
        format!(
            "{} / {}",
            format_duration(&self.position),
            format_duration(&self.duration.unwrap_or_default())
        )
    }
}

/// Something the player needs done after returning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Followup {
    None,
    /// Call [`Player::retry`] with these arguments once `after` has passed.
    Retry {
        generation: u64,
        attempt: u32,
        after: Duration,
    },
    Notify(Notification),
}

#[derive(Debug)]
pub struct Player<B> {
    state: PlayerState,
    backend: B,
    base_url: String,
    playback_retries: u32,
    retry_backoff: Duration,
    /// Bumped on every load, retries scheduled for older loads are ignored.
    generation: u64,
}

impl<B: AudioBackend> Player<B> {
    /// `base_url` is prepended to the songs' media paths.
    #[must_use]
    pub fn new(backend: B, base_url: impl Into<String>, settings: &ClientSettings) -> Self {
        Self {
            state: PlayerState::default(),
            backend,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            playback_retries: settings.playback_retries,
            retry_backoff: settings.playback_retry_backoff(),
            generation: 0,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &PlayerState {
        &self.state
    }

    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Replace the song list, keeping the current song selected if it's still there.
    pub fn set_songs(&mut self, songs: Vec<Song>) {
        let current_id = self.state.current_song().map(|song| song.id);
        self.state.songs = songs;
        match current_id {
            Some(id) => match self.state.songs.iter().position(|song| song.id == id) {
                Some(index) => self.state.current_index = Some(index),
                None => {
                    debug!("The current song is gone from the list, stopping");
                    self.stop();
                    self.state.current_index = None;
                }
            },
            None => self.state.current_index = None,
        }
    }

    /// Start playing the song at `index`.
    ///
    /// # Errors
    ///
    /// Returns an error, and changes nothing, if there is no song at `index`.
    pub fn play_index(&mut self, index: usize) -> Result<Followup, PlayerError> {
        let len = self.state.songs.len();
        if index >= len {
            return Err(PlayerError::OutOfRange { index, len });
        }
        if self.state.current_index == Some(index) && self.state.status == PlaybackStatus::Playing
        {
            debug!("Song {index} is already playing");
            return Ok(Followup::None);
        }
        Ok(self.load(index, 0))
    }

    /// Resume, or start the current (else the first) song.
    ///
    /// # Errors
    ///
    /// Returns an error if there is nothing to play.
    pub fn play(&mut self) -> Result<Followup, PlayerError> {
        match self.state.status {
            PlaybackStatus::Paused => Ok(self.start_playback()),
            PlaybackStatus::Idle | PlaybackStatus::Failed(_) => {
                if self.state.songs.is_empty() {
                    return Err(PlayerError::Empty);
                }
                let index = self.state.current_index.unwrap_or(0);
                Ok(self.load(index, 0))
            }
            PlaybackStatus::Playing | PlaybackStatus::Loading { .. } => Ok(Followup::None),
        }
    }

    pub fn pause(&mut self) {
        if self.state.status == PlaybackStatus::Playing {
            self.backend.pause();
            self.state.status = PlaybackStatus::Paused;
        }
    }

    /// Pause when playing, play otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if there is nothing to play.
    pub fn toggle(&mut self) -> Result<Followup, PlayerError> {
        if self.state.status == PlaybackStatus::Playing {
            self.pause();
            Ok(Followup::None)
        } else {
            self.play()
        }
    }

    /// Move to the following song, staying put on the last one.
    pub fn next(&mut self) -> Followup {
        let target = match self.state.current_index {
            None if !self.state.songs.is_empty() => 0,
            Some(i) if i + 1 < self.state.songs.len() => i + 1,
            _ => return Followup::None,
        };
        self.load(target, 0)
    }

    /// Move to the preceding song, staying put on the first one.
    pub fn previous(&mut self) -> Followup {
        match self.state.current_index {
            Some(i) if i > 0 => self.load(i - 1, 0),
            _ => Followup::None,
        }
    }

    /// Jump to `percent` of the current song, if its length is known.
    pub fn seek(&mut self, percent: f64) {
        let Some(duration) = self.state.duration else {
            return;
        };
        if percent.is_nan() {
            return;
        }
        let position = duration.mul_f64(percent.clamp(0.0, 100.0) / 100.0);
        self.backend.seek(position);
        self.state.position = position;
    }

    pub fn set_volume(&mut self, volume: f32) {
        let volume = if volume.is_nan() {
            0.0
        } else {
            volume.clamp(0.0, 1.0)
        };
        self.backend.set_volume(volume);
        self.state.volume = volume;
    }

    /// Stop playback and hide the player, the current index is kept.
    pub fn stop(&mut self) {
        self.generation += 1;
        self.backend.stop();
        self.state.status = PlaybackStatus::Idle;
        self.state.position = Duration::ZERO;
        self.state.visible = false;
    }

    /// Reload after a failure, unless the user moved on since the retry was scheduled.
    pub fn retry(&mut self, generation: u64, attempt: u32) -> Followup {
        if generation != self.generation {
            debug!("Dropping a stale retry");
            return Followup::None;
        }
        match self.state.current_index {
            Some(index) => self.load(index, attempt),
            None => Followup::None,
        }
    }

    /// React to something the backend reported.
    pub fn on_event(&mut self, event: BackendEvent) -> Followup {
        match (event, self.state.status.clone()) {
            (BackendEvent::CanPlay { duration }, PlaybackStatus::Loading { .. }) => {
                self.state.duration = duration;
                self.start_playback()
            }
            (BackendEvent::LoadFailed(reason), PlaybackStatus::Loading { attempt }) => {
                self.handle_failure(attempt, reason)
            }
            (BackendEvent::Ended, PlaybackStatus::Playing) => self.advance(),
            (BackendEvent::Progress { position }, _) => {
                self.state.position = position;
                Followup::None
            }
            (event, status) => {
                debug!("Ignoring {event:?} while {status:?}");
                Followup::None
            }
        }
    }

    fn media_url(&self, song: &Song) -> String {
        format!("{}{}", self.base_url, public_path(&song.file_path))
    }

    fn load(&mut self, index: usize, attempt: u32) -> Followup {
        let Some(song) = self.state.songs.get(index) else {
            return Followup::None;
        };
        let url = self.media_url(song);
        info!("Loading {url} (attempt {})", attempt + 1);

        self.generation += 1;
        self.state.current_index = Some(index);
        self.state.visible = true;
        self.state.position = Duration::ZERO;
        self.state.duration = None;
        self.state.status = PlaybackStatus::Loading { attempt };

        match self.backend.load(&url) {
            Ok(()) => Followup::None,
            Err(e) => self.handle_failure(attempt, e.to_string()),
        }
    }

    fn start_playback(&mut self) -> Followup {
        match self.backend.play() {
            Ok(()) => {
                self.state.status = PlaybackStatus::Playing;
                Followup::None
            }
            Err(e) => {
                let attempt = match self.state.status {
                    PlaybackStatus::Loading { attempt } => attempt,
                    _ => 0,
                };
                self.handle_failure(attempt, e.to_string())
            }
        }
    }

    fn handle_failure(&mut self, attempt: u32, reason: String) -> Followup {
        if attempt < self.playback_retries {
            warn!(
                "Playback failed ({reason}), retrying ({}/{})",
                attempt + 1,
                self.playback_retries
            );
            self.state.status = PlaybackStatus::Loading { attempt };
            return Followup::Retry {
                generation: self.generation,
                attempt: attempt + 1,
                after: self.retry_backoff,
            };
        }

        warn!("Playback failed ({reason}), giving up");
        self.backend.stop();
        self.state.status = PlaybackStatus::Failed(reason);
        Followup::Notify(Notification::error(
            "the audio failed to load, check your network connection",
        ))
    }

    fn advance(&mut self) -> Followup {
        match self.state.current_index {
            None if !self.state.songs.is_empty() => self.load(0, 0),
            Some(i) if i + 1 < self.state.songs.len() => self.load(i + 1, 0),
            _ => {
                info!("Reached the end of the list");
                self.stop();
                Followup::None
            }
        }
    }
}
