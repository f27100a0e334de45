use std::path::PathBuf;

use clap::{CommandFactory, Parser};

mod handlers;

use handlers::{CommandHandler, Context, utils::WriteAdapter};
use songbox_cli::api::ApiClient;
use songbox_core::config::Settings;

/// Options configurable via the CLI.
#[derive(Debug, Parser)]
#[command(name = "songbox-cli", version = env!("CARGO_PKG_VERSION"), about)]
struct Flags {
    /// Url of the songbox daemon, overrides the config file
    #[clap(long, env = "SONGBOX_SERVER", value_hint = clap::ValueHint::Url)]
    server: Option<String>,
    /// Config file path
    #[clap(long, value_hint = clap::ValueHint::FilePath)]
    config: Option<PathBuf>,
    /// subcommand to run
    #[clap(subcommand)]
    subcommand: Option<handlers::Command>,
}

#[test]
fn verify_cli() {
    Flags::command().debug_assert();
}

/// Read the settings from `config`, or from the default location if it's not given.
fn load_settings(config: Option<PathBuf>) -> anyhow::Result<Settings> {
    let path = match config {
        Some(path) => path,
        None => Settings::get_config_path()?,
    };
    Ok(Settings::init(path, None, None)?)
}

#[cfg(not(tarpaulin_include))]
fn main() -> anyhow::Result<()> {
    let flags = Flags::parse();

    let mut settings = load_settings(flags.config)?;
    if let Some(server) = flags.server {
        settings.client.server_url = server;
    }

    // the player's controller and the audio downloads run next to the command
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    rt.block_on(async {
        let ctx = Context {
            client: ApiClient::from_settings(&settings.client),
            settings: settings.client,
        };

        let mut stdout_adapter = WriteAdapter(std::io::stdout());
        let mut stderr_adapter = WriteAdapter(std::io::stderr());

        if let Some(command) = flags.subcommand {
            command
                .handle(
                    &ctx,
                    &mut stdout_adapter,
                    &mut stderr_adapter,
                    &std::io::stdin(),
                )
                .await?;
        } else {
            eprintln!("No subcommand provided");
        }

        Ok(())
    })
}
