//! Persistence of song metadata.
//!
//! Two backends implement [`SongStore`]:
//! - [`sqlite::SqliteStore`], a durable store backed by an SQLite database file.
//! - [`memory::MemoryStore`], a volatile store used by the demo deployment and in tests.

pub mod schemas;

#[cfg(feature = "db")]
pub mod memory;
#[cfg(feature = "db")]
pub mod sqlite;

#[cfg(feature = "db")]
pub use store::SongStore;

#[cfg(feature = "db")]
mod store {
    use async_trait::async_trait;

    use super::schemas::song::{NewSong, Song};
    use crate::errors::Error;

    /// A place song metadata can be inserted into and listed from.
    ///
    /// Implementations must be safe to share between request handlers.
    #[async_trait]
    pub trait SongStore: Send + Sync + std::fmt::Debug {
        /// Persist a new song, returning the stored record with its assigned id.
        ///
        /// # Errors
        ///
        /// Returns an error if the backend could not persist the record.
        async fn insert(&self, song: NewSong) -> Result<Song, Error>;

        /// List every stored song, ordered by ascending id.
        ///
        /// # Errors
        ///
        /// Returns an error if the backend could not be queried.
        async fn list_all(&self) -> Result<Vec<Song>, Error>;

        /// Check that the backend is reachable.
        ///
        /// # Errors
        ///
        /// Returns an error if the backend is unavailable.
        async fn health_check(&self) -> Result<(), Error> {
            Ok(())
        }

        /// A short name of the backend, reported by the health endpoint.
        fn kind(&self) -> &'static str;
    }
}
