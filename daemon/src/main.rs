//! This is the daemon binary that runs the songbox http server.
//! there are no tests or anything else in this file because the only thing it does is set up and start the daemon
//! with functions from the `songbox_daemon` library crate (which is tested).

use std::path::PathBuf;

use songbox_core::{
    config::{Settings, StoreKind},
    get_data_dir,
};
use songbox_daemon::start_daemon;

use clap::Parser;

#[cfg(not(feature = "cli"))]
compile_error!("The cli feature is required to build the daemon binary");

/// Options configurable via the CLI.
#[derive(Parser)]
#[command(name = "songbox-daemon", version, about)]
struct Flags {
    /// Sets the port number to listen on.
    #[clap(long)]
    port: Option<u16>,
    /// config file path
    #[clap(long)]
    config: Option<PathBuf>,
    /// log level
    #[clap(long)]
    log_level: Option<log::LevelFilter>,
    /// Keep songs in memory, seeded with demo songs, instead of in the database.
    #[clap(long)]
    demo: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let flags = Flags::try_parse()?;

    let config_file = match flags.config {
        Some(config) => config,
        None => Settings::get_config_path()?,
    };

    let log_file = match get_data_dir() {
        Ok(data_dir) => data_dir.join("songbox.log"),
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Using a temporary directory for the log file");
            std::env::temp_dir().join("songbox.log")
        }
    };

    let mut settings = Settings::init(config_file, flags.port, flags.log_level)?;
    if flags.demo {
        settings.daemon.store = StoreKind::Memory;
    }

    start_daemon(settings, Some(log_file)).await
}
