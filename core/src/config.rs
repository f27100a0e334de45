//! Handles the configuration of the daemon and the client.
//!
//! this module is responsible for parsing the Songbox.toml file, layering environment variables
//! and cli arguments on top of it.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use strum::{Display, EnumString};

use std::{path::PathBuf, str::FromStr, time::Duration};

pub static DEFAULT_CONFIG: &str = include_str!("../Songbox.toml");

#[derive(Clone, Debug, Deserialize, Default, PartialEq, Eq)]
pub struct Settings {
    /// General Daemon Settings
    #[serde(default)]
    pub daemon: DaemonSettings,
    /// Settings for the client and player
    #[serde(default)]
    pub client: ClientSettings,
}

impl Settings {
    /// Load settings from the config file, environment variables, and CLI arguments.
    ///
    /// Sources are layered in order of increasing priority:
    /// 1. the config file at `config`
    /// 2. environment variables prefixed with `SONGBOX_` (sections separated by `__`)
    /// 3. the conventional `PORT` and `NODE_ENV` variables
    /// 4. the explicit `port` and `log_level` arguments
    ///
    /// # Errors
    ///
    /// This function will return an error if the config file is not found or if the config file is
    /// invalid.
    #[inline]
    pub fn init(
        config: PathBuf,
        port: Option<u16>,
        log_level: Option<log::LevelFilter>,
    ) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::from(config))
            .add_source(
                Environment::with_prefix("SONGBOX")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("daemon.allowed_mime_types"),
            )
            .build()?;

        let mut settings: Self = s.try_deserialize()?;

        settings.apply_conventional_env(
            std::env::var("PORT").ok().as_deref(),
            std::env::var("NODE_ENV").ok().as_deref(),
        )?;

        settings.daemon.expand_paths();

        if let Some(port) = port {
            settings.daemon.port = port;
        }

        if let Some(log_level) = log_level {
            settings.daemon.log_level = log_level;
        }

        Ok(settings)
    }

    /// Apply the values of the `PORT` and `NODE_ENV` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `port` isn't a valid port number.
    #[inline]
    pub fn apply_conventional_env(
        &mut self,
        port: Option<&str>,
        node_env: Option<&str>,
    ) -> Result<(), ConfigError> {
        if let Some(port) = port.filter(|p| !p.trim().is_empty()) {
            self.daemon.port = port.trim().parse().map_err(|_| {
                ConfigError::Message(format!("PORT must be a valid port number, got `{port}`"))
            })?;
        }
        if let Some(node_env) = node_env {
            self.daemon.environment = if node_env.eq_ignore_ascii_case("production") {
                RuntimeEnvironment::Production
            } else {
                RuntimeEnvironment::Development
            };
        }
        Ok(())
    }

    /// Get the (default) path to the config file.
    /// If the config file does not exist at this path, it will be created with the default config.
    ///
    /// See [`crate::get_config_dir`] for more information about where this default path is located.
    ///
    /// # Errors
    ///
    /// This function will return an error if the system config directory (e.g., `~/.config` on linux) could not be found, or if the config file was missing and could not be created.
    #[inline]
    pub fn get_config_path() -> Result<PathBuf, std::io::Error> {
        match crate::get_config_dir() {
            Ok(config_dir) => {
                // if the config directory does not exist, create it
                if !config_dir.exists() {
                    std::fs::create_dir_all(&config_dir)?;
                }
                let config_file = config_dir.join("Songbox.toml");

                if !config_file.exists() {
                    std::fs::write(&config_file, DEFAULT_CONFIG)?;
                }

                Ok(config_file)
            }
            Err(e) => Err(std::io::Error::new(std::io::ErrorKind::NotFound, e)),
        }
    }
}

/// Which [`SongStore`](https://docs.rs/songbox-storage) backend the daemon uses.
#[derive(Clone, Copy, Debug, Deserialize, Default, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StoreKind {
    /// Persistent storage in an SQLite database file.
    #[default]
    Sqlite,
    /// Volatile storage, seeded with demo songs.
    Memory,
}

/// The deployment the daemon is running as, reported by the health endpoint in demo mode.
#[derive(Clone, Copy, Debug, Deserialize, Default, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RuntimeEnvironment {
    #[default]
    Development,
    Production,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct DaemonSettings {
    /// The port to listen on for http requests.
    /// Default is 3000.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Where song metadata is kept.
    #[serde(default)]
    pub store: StoreKind,
    /// Path of the SQLite database, used when `store` is `sqlite`.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Root of the uploaded media tree.
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,
    /// Directory holding the static client bundle.
    #[serde(default = "default_client_dir")]
    pub client_dir: PathBuf,
    /// Maximum size of an uploaded file in bytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,
    /// Content types the upload endpoint accepts.
    #[serde(default = "default_allowed_mime_types")]
    pub allowed_mime_types: Vec<String>,
    /// `max-age` of the `Cache-Control` header on uploaded media, in seconds.
    #[serde(default = "default_media_max_age")]
    pub media_max_age: u64,
    #[serde(default)]
    pub environment: RuntimeEnvironment,
    /// The log level to use.
    #[serde(default = "default_log_level")]
    #[serde(deserialize_with = "de_log_level")]
    pub log_level: log::LevelFilter,
}

impl DaemonSettings {
    fn expand_paths(&mut self) {
        for path in [&mut self.db_path, &mut self.uploads_dir, &mut self.client_dir] {
            *path = shellexpand::tilde(&path.to_string_lossy())
                .into_owned()
                .into();
        }
    }

    /// Whether `mime` is one of the allowed upload content types.
    #[must_use]
    #[inline]
    pub fn is_allowed_mime_type(&self, mime: &str) -> bool {
        self.allowed_mime_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(mime.trim()))
    }
}

fn de_log_level<'de, D>(deserializer: D) -> Result<log::LevelFilter, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(log::LevelFilter::from_str(&s).unwrap_or_else(|_| default_log_level()))
}

const fn default_port() -> u16 {
    3000
}

fn default_db_path() -> PathBuf {
    PathBuf::from("music.db")
}

fn default_uploads_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_client_dir() -> PathBuf {
    PathBuf::from("client")
}

const fn default_max_upload_size() -> u64 {
    10 * 1024 * 1024
}

fn default_allowed_mime_types() -> Vec<String> {
    vec!["audio/mpeg".into(), "audio/wav".into(), "audio/ogg".into()]
}

const fn default_media_max_age() -> u64 {
    7 * 24 * 60 * 60
}

const fn default_log_level() -> log::LevelFilter {
    log::LevelFilter::Info
}

impl Default for DaemonSettings {
    #[inline]
    fn default() -> Self {
        Self {
            port: default_port(),
            store: StoreKind::default(),
            db_path: default_db_path(),
            uploads_dir: default_uploads_dir(),
            client_dir: default_client_dir(),
            max_upload_size: default_max_upload_size(),
            allowed_mime_types: default_allowed_mime_types(),
            media_max_age: default_media_max_age(),
            environment: RuntimeEnvironment::default(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ClientSettings {
    /// Base url of the daemon.
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// How many times the song list request is retried after the first attempt.
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: u32,
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    #[serde(default = "default_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// How many times a track that fails to load is reloaded before giving up.
    #[serde(default = "default_playback_retries")]
    pub playback_retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub playback_retry_backoff_ms: u64,
    #[serde(default = "default_skip_debounce_ms")]
    pub skip_debounce_ms: u64,
}

impl ClientSettings {
    #[must_use]
    #[inline]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    #[must_use]
    #[inline]
    pub const fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    #[must_use]
    #[inline]
    pub const fn playback_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.playback_retry_backoff_ms)
    }

    #[must_use]
    #[inline]
    pub const fn skip_debounce(&self) -> Duration {
        Duration::from_millis(self.skip_debounce_ms)
    }
}

fn default_server_url() -> String {
    "http://localhost:3000".into()
}

const fn default_fetch_retries() -> u32 {
    3
}

const fn default_fetch_timeout_ms() -> u64 {
    5000
}

const fn default_backoff_ms() -> u64 {
    1000
}

const fn default_playback_retries() -> u32 {
    2
}

const fn default_skip_debounce_ms() -> u64 {
    300
}

impl Default for ClientSettings {
    #[inline]
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            fetch_retries: default_fetch_retries(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            retry_backoff_ms: default_backoff_ms(),
            playback_retries: default_playback_retries(),
            playback_retry_backoff_ms: default_backoff_ms(),
            skip_debounce_ms: default_skip_debounce_ms(),
        }
    }
}
