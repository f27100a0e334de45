//! The task that owns a [`Player`] and feeds it.
//!
//! User actions, backend events, retry timers and the skip debouncers are multiplexed in a single
//! loop, every change of the player state is published on a watch channel.

use std::{future::pending, time::Duration};

use log::{debug, error};
use tokio::{
    sync::{
        mpsc::{UnboundedReceiver, UnboundedSender},
        watch,
    },
    time::{Instant, sleep_until},
};

use songbox_storage::db::schemas::song::Song;

use super::{
    Followup, Player, PlayerState,
    backend::{AudioBackend, BackendEvent},
    debounce::Debouncer,
};
use crate::notification::Notification;

#[derive(Debug, Clone, PartialEq)]
pub enum UserAction {
    PlayIndex(usize),
    Play,
    Pause,
    Toggle,
    Next,
    Previous,
    /// Percent of the current song.
    Seek(f64),
    Volume(f32),
    SetSongs(Vec<Song>),
}

struct PendingRetry {
    at: Instant,
    generation: u64,
    attempt: u32,
}

/// The ends of a running controller that the rest of the client holds on to.
#[derive(Debug)]
pub struct ControllerHandle {
    pub actions: UnboundedSender<UserAction>,
    pub state: watch::Receiver<PlayerState>,
    pub notifications: UnboundedReceiver<Notification>,
}

pub struct Controller<B> {
    player: Player<B>,
    next: Debouncer<()>,
    previous: Debouncer<()>,
    retry: Option<PendingRetry>,
    state_tx: watch::Sender<PlayerState>,
    notify_tx: UnboundedSender<Notification>,
}

async fn sleep_until_some(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => pending().await,
    }
}

impl<B: AudioBackend + 'static> Controller<B> {
    /// Spawn a controller for `player` on the current runtime.
    ///
    /// `events` must be the receiving end of the channel the backend reports to. The task ends
    /// once every [`ControllerHandle::actions`] sender is dropped, and hands the player back.
    pub fn spawn(
        player: Player<B>,
        events: UnboundedReceiver<BackendEvent>,
        skip_debounce: Duration,
    ) -> (ControllerHandle, tokio::task::JoinHandle<Player<B>>) {
        let (actions_tx, actions_rx) = tokio::sync::mpsc::unbounded_channel();
        let (notify_tx, notify_rx) = tokio::sync::mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(player.state().clone());

        let controller = Self {
            player,
            next: Debouncer::new(skip_debounce),
            previous: Debouncer::new(skip_debounce),
            retry: None,
            state_tx,
            notify_tx,
        };
        let handle = tokio::spawn(controller.run(actions_rx, events));

        (
            ControllerHandle {
                actions: actions_tx,
                state: state_rx,
                notifications: notify_rx,
            },
            handle,
        )
    }

    async fn run(
        mut self,
        mut actions: UnboundedReceiver<UserAction>,
        mut events: UnboundedReceiver<BackendEvent>,
    ) -> Player<B> {
        loop {
            let retry_at = self.retry.as_ref().map(|retry| retry.at);
            let next_at = self.next.deadline();
            let previous_at = self.previous.deadline();

            let followup = tokio::select! {
                action = actions.recv() => match action {
                    Some(action) => self.on_action(action),
                    None => break,
                },
                Some(event) = events.recv() => self.player.on_event(event),
                () = sleep_until_some(retry_at) => match self.retry.take() {
                    Some(PendingRetry { generation, attempt, .. }) => self.player.retry(generation, attempt),
                    None => Followup::None,
                },
                () = sleep_until_some(next_at) => match self.next.take_due(Instant::now()) {
                    Some(()) => self.player.next(),
                    None => Followup::None,
                },
                () = sleep_until_some(previous_at) => match self.previous.take_due(Instant::now()) {
                    Some(()) => self.player.previous(),
                    None => Followup::None,
                },
            };

            self.handle(followup);
            self.state_tx.send_if_modified(|state| {
                let changed = *state != *self.player.state();
                if changed {
                    state.clone_from(self.player.state());
                }
                changed
            });
        }

        debug!("Player controller shutting down");
        self.player.stop();
        self.player
    }

    fn on_action(&mut self, action: UserAction) -> Followup {
        let result = match action {
            UserAction::PlayIndex(index) => self.player.play_index(index),
            UserAction::Play => self.player.play(),
            UserAction::Toggle => self.player.toggle(),
            UserAction::Pause => {
                self.player.pause();
                Ok(Followup::None)
            }
            UserAction::Next => {
                self.next.trigger(());
                Ok(Followup::None)
            }
            UserAction::Previous => {
                self.previous.trigger(());
                Ok(Followup::None)
            }
            UserAction::Seek(percent) => {
                self.player.seek(percent);
                Ok(Followup::None)
            }
            UserAction::Volume(volume) => {
                self.player.set_volume(volume);
                Ok(Followup::None)
            }
            UserAction::SetSongs(songs) => {
                self.player.set_songs(songs);
                Ok(Followup::None)
            }
        };
        result.unwrap_or_else(|e| Followup::Notify(Notification::error(e.to_string())))
    }

    fn handle(&mut self, followup: Followup) {
        match followup {
            Followup::None => {}
            Followup::Retry {
                generation,
                attempt,
                after,
            } => {
                self.retry = Some(PendingRetry {
                    at: Instant::now() + after,
                    generation,
                    attempt,
                });
            }
            Followup::Notify(notification) => {
                if self.notify_tx.send(notification).is_err() {
                    error!("Nobody is listening for player notifications");
                }
            }
        }
    }
}
