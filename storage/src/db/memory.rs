//----------------------------------------------------------------------------------------- std lib
use std::sync::Arc;
//--------------------------------------------------------------------------------- other libraries
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
//----------------------------------------------------------------------------------- local modules
use super::{
    SongStore,
    schemas::song::{NewSong, Song, SongId},
};
use crate::errors::Error;

/// Song metadata held in process memory. Everything is lost on restart.
///
/// Ids are assigned as `len + 1`, which is unique as long as nothing is ever removed.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    songs: Arc<RwLock<Vec<Song>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store preloaded with the two demo songs.
    #[must_use]
    pub fn with_demo_songs() -> Self {
        Self {
            songs: Arc::new(RwLock::new(demo_songs())),
        }
    }
}

#[must_use]
pub fn demo_songs() -> Vec<Song> {
    vec![
        NewSong::new("Demo Song 1", "Demo Artist", "/uploads/demo1.mp3").into_song(1, None),
        NewSong::new("Demo Song 2", "Demo Artist", "/uploads/demo2.mp3").into_song(2, None),
    ]
}

#[async_trait]
impl SongStore for MemoryStore {
    async fn insert(&self, song: NewSong) -> Result<Song, Error> {
        let mut songs = self.songs.write().await;
        let id = SongId::try_from(songs.len()).map_err(|_| Error::NotCreated)? + 1;
        let song = song.into_song(id, Some(Utc::now()));
        songs.push(song.clone());
        Ok(song)
    }

    async fn list_all(&self) -> Result<Vec<Song>, Error> {
        Ok(self.songs.read().await.clone())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}
