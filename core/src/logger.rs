//----------------------------------------------------------------------------------------- std lib
use std::{
    fs::File,
    io::Write,
    path::PathBuf,
    time::Instant,
};
//--------------------------------------------------------------------------------- other libraries
use env_logger::fmt::style::Style;
use log::info;
use once_cell::sync::Lazy;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt as _};

// This will get initialized below.
/// Returns the init [`Instant`]
pub static INIT_INSTANT: Lazy<Instant> = Lazy::new(Instant::now);

/// The filter used when `RUST_LOG` isn't set: silence every crate except ours.
#[must_use]
#[inline]
pub fn default_filter(level: log::LevelFilter) -> String {
    format!("off,songbox={level},tower_http={level}")
}

/// Writes every log line to stderr and, if one was given, to a log file.
struct Tee {
    file: Option<File>,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        std::io::stderr().write_all(buf)?;
        if let Some(file) = self.file.as_mut() {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::stderr().flush()?;
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

//---------------------------------------------------------------------------------------------------- Logger init function
#[allow(clippy::module_name_repetitions)]
/// Initializes the logger.
///
/// This enables console logging on all the internals of `Songbox`,
/// and mirrors it to `log_file` when one is given.
///
/// Functionality is provided by [`log`].
///
/// The levels are:
/// - ERROR
/// - WARN
/// - INFO
/// - DEBUG
/// - TRACE
///
/// # Panics
/// This must only be called _once_.
#[cfg(not(tarpaulin_include))]
#[inline]
pub fn init_logger(filter: log::LevelFilter, log_file: Option<PathBuf>) {
    // Initialize timer.
    let now = Lazy::force(&INIT_INSTANT);

    // If `RUST_LOG` isn't set, disable all library crate logs except for songbox and its sub-crates.
    let env = std::env::var("RUST_LOG").unwrap_or_default();
    let directives = if env.is_empty() {
        default_filter(filter)
    } else {
        env.clone()
    };

    let file = log_file.and_then(|path| {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match File::options().create(true).append(true).open(&path) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!("Unable to open log file {}: {e}", path.display());
                None
            }
        }
    });
    let to_file = file.is_some();

    let dimmed = Style::new().dimmed();

    env_logger::Builder::new()
        .format(move |buf, record| {
            let level_style = buf.default_level_style(record.level()).bold();
            let level = match record.level() {
                log::Level::Debug => "D",
                log::Level::Trace => "T",
                log::Level::Info => "I",
                log::Level::Warn => "W",
                log::Level::Error => "E",
            };
            writeln!(
                buf,
                // Longest PATH in the repo: `storage/src/db/schemas/song.rs` - `30` characters
                // Longest file in the repo: `daemon/src/api_tests.rs`        - `3` digits
                //
                //      Longest PATH ---|        |--- Longest file
                //                      |        |
                //                      v        v
                "| {level_style}{level}{level_style:#} | {dimmed}{}{dimmed:#} | {dimmed}{: >30} @ {: <4}{dimmed:#} | {}",
                crate::format_duration(&now.elapsed()),
                record.file_static().unwrap_or("???"),
                record.line().unwrap_or(0),
                record.args(),
            )
        })
        .target(env_logger::Target::Pipe(Box::new(Tee { file })))
        .write_style(if to_file {
            env_logger::WriteStyle::Never
        } else {
            env_logger::WriteStyle::Always
        })
        .parse_filters(&directives)
        .init();

    if env.is_empty() {
        info!("Log Level (Flag) ... {filter}");
    } else {
        info!("Log Level (RUST_LOG) ... {env}");
    }
}

/// Initializes the tracing layer.
///
/// Spans and events from `songbox` crates (and the http tracing middleware) are formatted to stderr,
/// filtered by `RUST_LOG` if it is set.
///
/// # Panics
///
/// panics if the default filter directives cannot be parsed.
#[must_use]
#[inline]
pub fn init_tracing(level: log::LevelFilter) -> impl tracing::Subscriber + Send + Sync {
    #[cfg(not(feature = "verbose_tracing"))]
    let directives = default_filter(level);
    #[cfg(feature = "verbose_tracing")]
    let directives = {
        let _ = level;
        String::from("trace,h2=off,hyper=off")
    };

    let filter = EnvFilter::builder()
        .with_env_var("RUST_LOG")
        .try_from_env()
        .unwrap_or_else(|_| EnvFilter::builder().parse_lossy(directives));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true).compact())
}
