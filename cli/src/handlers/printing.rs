//! Handles displaying the output of the commands in a human readable format.

use std::fmt::Write;

use songbox_cli::{
    api::Uploaded,
    player::{PlaybackStatus, PlayerState, VolumeLevel},
};
use songbox_storage::db::schemas::song::Song;

pub const PLAYER_HELP: &str = "\
commands:
  <number>     play that song
  n / p        next / previous song
  t or space   play / pause
  s <percent>  seek, e.g. `s 50`
  v <volume>   volume between 0 and 1, e.g. `v 0.4`
  l            list the songs again
  h            show this help
  q            quit";

pub fn song_list(songs: &[Song]) -> Result<String, std::fmt::Error> {
    let mut output = String::new();
    if songs.is_empty() {
        writeln!(output, "No songs uploaded yet")?;
        return Ok(output);
    }

    writeln!(output, "Songs:")?;
    for (i, song) in songs.iter().enumerate() {
        writeln!(
            output,
            "\t{}: \"{}\" by {} ({})",
            i + 1,
            song.title,
            song.artist,
            song.public_path()
        )?;
    }
    Ok(output)
}

pub fn uploaded(song: &Uploaded) -> Result<String, std::fmt::Error> {
    let mut output = String::new();
    writeln!(output, "Uploaded \"{}\" by {}", song.title, song.artist)?;
    writeln!(output, "\tid: {}", song.id)?;
    write!(output, "\tserved at: {}", song.file_path)?;
    Ok(output)
}

pub fn health(body: &serde_json::Value) -> Result<String, std::fmt::Error> {
    let mut output = String::new();
    let field = |key: &str| body.get(key).and_then(serde_json::Value::as_str);

    writeln!(output, "Daemon status: {}", field("status").unwrap_or("unknown"))?;
    if let Some(environment) = field("environment") {
        writeln!(output, "\tenvironment: {environment}")?;
    }
    if let Some(timestamp) = field("timestamp") {
        write!(output, "\ttimestamp: {timestamp}")?;
    }
    Ok(output)
}

const fn volume_label(level: VolumeLevel) -> &'static str {
    match level {
        VolumeLevel::Muted => "muted",
        VolumeLevel::Low => "low",
        VolumeLevel::High => "high",
    }
}

/// One line describing what the player is doing.
pub fn now_playing(state: &PlayerState) -> String {
    let Some(song) = state.current_song() else {
        return "Stopped".to_string();
    };
    let position = format!(
        "{}/{}",
        state.current_index.unwrap_or_default() + 1,
        state.songs.len()
    );
    let name = format!("\"{}\" by {}", song.title, song.artist);

    match &state.status {
        PlaybackStatus::Idle if !state.visible => "Stopped".to_string(),
        PlaybackStatus::Idle => format!("Ready {position}: {name}"),
        PlaybackStatus::Loading { attempt: 0 } => format!("Loading {position}: {name}"),
        PlaybackStatus::Loading { attempt } => {
            format!("Loading {position}: {name} (retry {attempt})")
        }
        PlaybackStatus::Playing => format!(
            "Playing {position}: {name} [{}] volume {}",
            state.progress_label(),
            volume_label(state.volume_level())
        ),
        PlaybackStatus::Paused => format!("Paused {position}: {name} [{}]", state.progress_label()),
        PlaybackStatus::Failed(reason) => format!("Failed to play {name}: {reason}"),
    }
}
