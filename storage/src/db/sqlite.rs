//----------------------------------------------------------------------------------------- std lib
use std::{path::Path, str::FromStr, time::Duration};
//--------------------------------------------------------------------------------- other libraries
use async_trait::async_trait;
use chrono::Utc;
use log::info;
use sqlx::{
    Pool, Sqlite,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use tracing::instrument;
//----------------------------------------------------------------------------------- local modules
use super::{
    SongStore,
    schemas::song::{NewSong, Song, TABLE_NAME},
};
use crate::errors::Error;

const REQUIRED_COLUMNS: [&str; 5] = ["id", "title", "artist", "file_path", "created_at"];

/// Song metadata stored in an SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if necessary) the database at `path` and make sure the schema exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory can't be created, the database can't be opened,
    /// or an existing `songs` table is missing required columns.
    #[instrument]
    pub async fn open(path: &Path) -> Result<Self, Error> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!("Connected to song database at {}", path.display());
        Ok(store)
    }

    /// Create a store backed by a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database can't be created.
    pub async fn in_memory() -> Result<Self, Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // every connection to `:memory:` is its own database, so keep exactly one alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Create the songs table and its index if they don't exist yet.
    ///
    /// Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema could not be created, or an existing table is incompatible.
    pub async fn migrate(&self) -> Result<(), Error> {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {TABLE_NAME} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                artist TEXT NOT NULL,
                file_path TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )"
        ))
        .execute(&self.pool)
        .await?;

        let columns: Vec<(String,)> =
            sqlx::query_as(&format!("SELECT name FROM pragma_table_info('{TABLE_NAME}')"))
                .fetch_all(&self.pool)
                .await?;
        if let Some(missing) = REQUIRED_COLUMNS
            .iter()
            .find(|required| !columns.iter().any(|(name,)| name == *required))
        {
            return Err(Error::Migration(format!(
                "table `{TABLE_NAME}` is missing column `{missing}`"
            )));
        }

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_songs_artist ON {TABLE_NAME} (artist)"
        ))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[must_use]
    pub const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl SongStore for SqliteStore {
    #[instrument(skip(self))]
    async fn insert(&self, song: NewSong) -> Result<Song, Error> {
        let inserted: Option<Song> = sqlx::query_as(&format!(
            "INSERT INTO {TABLE_NAME} (title, artist, file_path, created_at) VALUES (?, ?, ?, ?)
             RETURNING id, title, artist, file_path, created_at"
        ))
        .bind(&song.title)
        .bind(&song.artist)
        .bind(&song.file_path)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        inserted.ok_or(Error::NotCreated)
    }

    #[instrument(skip(self))]
    async fn list_all(&self) -> Result<Vec<Song>, Error> {
        Ok(sqlx::query_as(&format!(
            "SELECT id, title, artist, file_path, created_at FROM {TABLE_NAME} ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?)
    }

    async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "sqlite"
    }
}
