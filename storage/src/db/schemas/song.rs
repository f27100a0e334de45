#![allow(clippy::module_name_repetitions)]
//----------------------------------------------------------------------------------------- std lib
#[cfg(any(test, feature = "test_utils"))]
use std::path::{Path, PathBuf};
//--------------------------------------------------------------------------------- other libraries
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type SongId = i64;

pub const TABLE_NAME: &str = "songs";

/// The directory (relative to the site root) that uploaded media is published under.
pub const UPLOADS_PREFIX: &str = "uploads";

/// This struct holds the metadata of one uploaded [`Song`].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Song {
    /// The unique identifier for this [`Song`], assigned by the store.
    pub id: SongId,
    /// Title of the [`Song`].
    pub title: String,
    /// Artist of the [`Song`].
    pub artist: String,
    /// Where the audio file lives, relative to the site root
    /// (e.g. `uploads/2024/05/1715000000000.mp3`).
    ///
    /// Records created by older deployments may carry a leading `/` or `\` separators,
    /// use [`Song::public_path`] to get something that can be requested from the server.
    pub file_path: String,
    /// When the [`Song`] was inserted, if the store recorded it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Song {
    /// The url path the media of this song is served at, always starting with `/`.
    #[must_use]
    pub fn public_path(&self) -> String {
        public_path(&self.file_path)
    }

    /// Resolve the location of this song's media on disk, given the directory uploads are stored in.
    ///
    /// Returns `None` if the song's path isn't inside the uploads prefix.
    #[cfg(any(test, feature = "test_utils"))]
    #[must_use]
    pub fn local_path(&self, uploads_dir: &Path) -> Option<PathBuf> {
        let public = self.public_path();
        let relative = public
            .strip_prefix('/')?
            .strip_prefix(UPLOADS_PREFIX)?
            .strip_prefix('/')?;

        let mut path = uploads_dir.to_path_buf();
        for segment in relative.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return None;
            }
            path.push(segment);
        }
        Some(path)
    }
}

/// Normalize a stored file path into the url path it is served at.
#[must_use]
pub fn public_path(file_path: &str) -> String {
    let normalized = file_path.replace('\\', "/");
    if normalized.starts_with('/') {
        normalized
    } else {
        format!("/{normalized}")
    }
}

/// The fields of a [`Song`] that are provided by the uploader.
///
/// The store is responsible for assigning the `id` and `created_at` fields.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct NewSong {
    pub title: String,
    pub artist: String,
    pub file_path: String,
}

impl NewSong {
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        artist: impl Into<String>,
        file_path: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            file_path: file_path.into(),
        }
    }

    /// Turn this into a full [`Song`] with the given id and creation time.
    #[must_use]
    pub fn into_song(self, id: SongId, created_at: Option<DateTime<Utc>>) -> Song {
        Song {
            id,
            title: self.title,
            artist: self.artist,
            file_path: self.file_path,
            created_at,
        }
    }
}
