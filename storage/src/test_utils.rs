use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use anyhow::Result;
use async_trait::async_trait;
use rstest::fixture;

use crate::{
    db::{
        SongStore,
        memory::MemoryStore,
        schemas::song::{NewSong, Song},
        sqlite::SqliteStore,
    },
    errors::Error,
};

/// Initialize a fresh in-memory SQLite store for a single test.
///
/// # Errors
///
/// Returns an error if the database could not be created.
pub async fn init_test_database() -> Result<SqliteStore> {
    Ok(SqliteStore::in_memory().await?)
}

/// An uploader-provided song whose fields are derived from `n`.
#[must_use]
pub fn arb_new_song(n: usize) -> NewSong {
    NewSong::new(
        format!("Title {n}"),
        format!("Artist {n}"),
        format!("uploads/2024/05/{n}.mp3"),
    )
}

#[fixture]
pub fn new_song() -> NewSong {
    arb_new_song(0)
}

#[fixture]
pub fn demo_store() -> MemoryStore {
    MemoryStore::with_demo_songs()
}

/// A store whose writes always fail, for exercising error paths.
///
/// Reads return whatever `songs` it was created with.
#[derive(Debug, Default)]
pub struct FailingStore {
    pub songs: Vec<Song>,
    pub insert_attempts: Arc<AtomicUsize>,
}

impl FailingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn attempts(&self) -> usize {
        self.insert_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SongStore for FailingStore {
    async fn insert(&self, _: NewSong) -> Result<Song, Error> {
        self.insert_attempts.fetch_add(1, Ordering::SeqCst);
        Err(Error::NotCreated)
    }

    async fn list_all(&self) -> Result<Vec<Song>, Error> {
        Ok(self.songs.clone())
    }

    async fn health_check(&self) -> Result<(), Error> {
        Err(Error::NotCreated)
    }

    fn kind(&self) -> &'static str {
        "failing"
    }
}
