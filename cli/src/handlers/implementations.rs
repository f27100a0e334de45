use std::fmt::Write as _;

use anyhow::anyhow;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

use songbox_cli::{
    api::ClientError,
    player::{
        Player, PlaybackStatus,
        backend::{AudioBackend, BackendEvent},
        controller::{Controller, UserAction},
    },
};
use songbox_storage::db::schemas::song::Song;

use super::{
    Command, CommandHandler, Context, InputError, PlayerInput, printing, utils::StdIn,
};

/// Turn a client error into one that tells the user what to try.
fn report(error: &ClientError) -> anyhow::Error {
    anyhow!(error.user_message())
}

impl CommandHandler for Command {
    type Output = anyhow::Result<()>;

    async fn handle<W1: std::fmt::Write + Send, W2: std::fmt::Write + Send, I: StdIn>(
        &self,
        ctx: &Context,
        stdout: &mut W1,
        stderr: &mut W2,
        stdin: &I,
    ) -> Self::Output {
        match self {
            Self::Health => {
                let body = ctx.client.health().await.map_err(|e| report(&e))?;
                writeln!(stdout, "{}", printing::health(&body)?)?;
                Ok(())
            }
            Self::List => {
                let songs = ctx.client.list_songs().await.map_err(|e| report(&e))?;
                write!(stdout, "{}", printing::song_list(&songs)?)?;
                Ok(())
            }
            Self::Upload {
                title,
                artist,
                file,
            } => {
                if title.trim().is_empty() || artist.trim().is_empty() {
                    anyhow::bail!("title and artist must not be empty");
                }
                let song = ctx
                    .client
                    .upload_song(title, artist, file)
                    .await
                    .map_err(|e| report(&e))?;
                writeln!(stdout, "{}", printing::uploaded(&song)?)?;

                // show the list the way it looks now
                match ctx.client.list_songs().await {
                    Ok(songs) => write!(stdout, "{}", printing::song_list(&songs)?)?,
                    Err(e) => writeln!(stderr, "Could not refresh the list: {}", e.user_message())?,
                }
                Ok(())
            }
            Self::Play { index } => {
                let songs = ctx.client.list_songs().await.map_err(|e| report(&e))?;
                let (events_tx, events_rx) = unbounded_channel();
                let backend = open_backend(events_tx)?;
                if stdin.is_terminal() {
                    writeln!(stdout, "{}", printing::PLAYER_HELP)?;
                }
                run_player(
                    backend,
                    events_rx,
                    songs,
                    *index,
                    ctx,
                    stdin.line_channel(),
                    stdout,
                    stderr,
                )
                .await
            }
        }
    }
}

#[cfg(feature = "audio")]
fn open_backend(
    events: tokio::sync::mpsc::UnboundedSender<BackendEvent>,
) -> anyhow::Result<songbox_cli::player::rodio_backend::RodioBackend> {
    Ok(songbox_cli::player::rodio_backend::RodioBackend::start(events)?)
}

#[cfg(not(feature = "audio"))]
fn open_backend(
    _events: tokio::sync::mpsc::UnboundedSender<BackendEvent>,
) -> anyhow::Result<songbox_cli::player::backend::MockBackend> {
    anyhow::bail!("this build has no audio output, rebuild songbox-cli with `--features audio`")
}

/// Run the interactive player until the user quits or input ends.
///
/// `start` is the 1-based number of the song to start with.
#[allow(clippy::too_many_arguments)]
pub async fn run_player<B, W1, W2>(
    backend: B,
    events: UnboundedReceiver<BackendEvent>,
    songs: Vec<Song>,
    start: Option<usize>,
    ctx: &Context,
    mut lines: UnboundedReceiver<String>,
    stdout: &mut W1,
    stderr: &mut W2,
) -> anyhow::Result<()>
where
    B: AudioBackend + 'static,
    W1: std::fmt::Write + Send,
    W2: std::fmt::Write + Send,
{
    write!(stdout, "{}", printing::song_list(&songs)?)?;

    let player = Player::new(backend, ctx.client.base_url(), &ctx.settings);
    let (mut handle, task) = Controller::spawn(player, events, ctx.settings.skip_debounce());
    handle.actions.send(UserAction::SetSongs(songs))?;
    match start {
        Some(0) => writeln!(stderr, "{}", InputError::ZeroIndex)?,
        Some(number) => handle.actions.send(UserAction::PlayIndex(number - 1))?,
        None => {}
    }

    let mut shown: Option<(Option<usize>, PlaybackStatus)> = None;
    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else { break };
                match line.parse::<PlayerInput>() {
                    Ok(PlayerInput::Quit) => break,
                    Ok(PlayerInput::Help) => writeln!(stdout, "{}", printing::PLAYER_HELP)?,
                    Ok(PlayerInput::List) => {
                        let songs = handle.state.borrow().songs.clone();
                        write!(stdout, "{}", printing::song_list(&songs)?)?;
                    }
                    Ok(PlayerInput::Action(action)) => handle.actions.send(action)?,
                    Err(InputError::Empty) => {}
                    Err(e) => writeln!(stderr, "{e}")?,
                }
            }
            changed = handle.state.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = handle.state.borrow_and_update().clone();
                let key = (state.current_index, state.status.clone());
                if shown.as_ref() != Some(&key) {
                    writeln!(stdout, "{}", printing::now_playing(&state))?;
                    shown = Some(key);
                }
            }
            Some(notification) = handle.notifications.recv() => {
                writeln!(stderr, "{notification}")?;
            }
        }
    }

    drop(handle);
    task.await?;
    writeln!(stdout, "Bye")?;
    Ok(())
}
