pub mod implementations;
pub mod printing;
pub mod utils;


use std::{path::PathBuf, str::FromStr};

use clap::Subcommand;

use songbox_cli::{api::ApiClient, player::controller::UserAction};
use songbox_core::config::ClientSettings;

use utils::StdIn;

/// What every command gets to work with.
pub struct Context {
    pub client: ApiClient,
    pub settings: ClientSettings,
}

pub trait CommandHandler {
    type Output;

    async fn handle<W1: std::fmt::Write + Send, W2: std::fmt::Write + Send, I: StdIn>(
        &self,
        ctx: &Context,
        stdout: &mut W1,
        stderr: &mut W2,
        stdin: &I,
    ) -> Self::Output;
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Check that the daemon is up
    #[clap(alias = "ping")]
    Health,
    /// List the uploaded songs
    List,
    /// Upload an audio file
    Upload {
        /// Title of the song
        #[clap(long)]
        title: String,
        /// Artist of the song
        #[clap(long)]
        artist: String,
        /// The audio file (mp3, wav, or ogg)
        #[clap(value_hint = clap::ValueHint::FilePath)]
        file: PathBuf,
    },
    /// Play the uploaded songs, controlled by typing commands
    Play {
        /// Number of the song to start with, as shown by `list`
        #[clap(long)]
        index: Option<usize>,
    },
}

/// A line typed into the interactive player.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerInput {
    Action(UserAction),
    List,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("nothing typed")]
    Empty,
    #[error("songs are numbered from 1")]
    ZeroIndex,
    #[error("`{0}` needs a number, e.g. `{0} 50`")]
    MissingNumber(&'static str),
    #[error("unknown command `{0}`, type `h` for help")]
    Unknown(String),
}

impl FromStr for PlayerInput {
    type Err = InputError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        if line == " " {
            return Ok(Self::Action(UserAction::Toggle));
        }

        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Err(InputError::Empty);
        };
        let argument = words.next();

        Ok(match command {
            "q" | "quit" => Self::Quit,
            "h" | "help" | "?" => Self::Help,
            "l" | "list" => Self::List,
            "n" | "next" => Self::Action(UserAction::Next),
            "p" | "prev" | "previous" => Self::Action(UserAction::Previous),
            "t" | "toggle" => Self::Action(UserAction::Toggle),
            "s" | "seek" => Self::Action(UserAction::Seek(
                argument
                    .and_then(|arg| arg.trim_end_matches('%').parse::<f64>().ok())
                    .filter(|percent| percent.is_finite())
                    .ok_or(InputError::MissingNumber("s"))?,
            )),
            "v" | "volume" => Self::Action(UserAction::Volume(
                argument
                    .and_then(|arg| arg.parse::<f32>().ok())
                    .filter(|volume| volume.is_finite())
                    .ok_or(InputError::MissingNumber("v"))?,
            )),
            number => match number.parse::<usize>() {
                Ok(0) => return Err(InputError::ZeroIndex),
                Ok(n) => Self::Action(UserAction::PlayIndex(n - 1)),
                Err(_) => return Err(InputError::Unknown(line.trim().to_string())),
            },
        })
    }
}
