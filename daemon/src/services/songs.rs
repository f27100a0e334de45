//! `GET /api/songs` and `POST /api/songs`.

use axum::{
    Json,
    extract::{Multipart, State},
};
use log::info;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use songbox_storage::db::schemas::song::{NewSong, Song, SongId, public_path};

use crate::{
    AppState,
    errors::ApiError,
    upload::{PendingUpload, receive_file},
};

/// Name of the multipart field carrying the audio file.
pub const FILE_FIELD: &str = "song";

/// What a successful upload returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub id: SongId,
    pub title: String,
    pub artist: String,
    /// The url path the uploaded media is served at.
    pub file_path: String,
}

impl From<Song> for UploadResponse {
    #[inline]
    fn from(song: Song) -> Self {
        Self {
            file_path: public_path(&song.file_path),
            id: song.id,
            title: song.title,
            artist: song.artist,
        }
    }
}

/// List every stored song, in insertion order.
///
/// # Errors
///
/// Fails with a 500 if the store can't be read.
#[instrument(skip(state))]
#[inline]
pub async fn list_songs(State(state): State<AppState>) -> Result<Json<Vec<Song>>, ApiError> {
    Ok(Json(state.store.list_all().await?))
}

/// Accept an upload of an audio file with its title and artist.
///
/// The file is checked against the allowed content types before anything touches the disk,
/// and is removed again if the request fails at any later point.
///
/// # Errors
///
/// Fails with a 400 for invalid uploads, and a 500 if the file can't be written or the song can't be stored.
#[instrument(skip(state, multipart))]
#[inline]
pub async fn upload_song(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let settings = &state.settings.daemon;

    let mut title = None;
    let mut artist = None;
    let mut upload: Option<PendingUpload> = None;

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("title") => title = Some(field.text().await?),
            Some("artist") => artist = Some(field.text().await?),
            Some(FILE_FIELD) if upload.is_none() => {
                let mime = field.content_type().unwrap_or_default().to_owned();
                if !settings.is_allowed_mime_type(&mime) {
                    return Err(ApiError::UnsupportedMediaType {
                        allowed: settings.allowed_mime_types.join(", "),
                        got: mime,
                    });
                }
                upload = Some(
                    receive_file(
                        &mut field,
                        &settings.uploads_dir,
                        &mime,
                        settings.max_upload_size,
                    )
                    .await?,
                );
            }
            // unknown fields, and any file after the first, are skipped
            _ => {}
        }
    }

    let upload = upload.ok_or(ApiError::MissingFile)?;

    let title = title.as_deref().map(str::trim).unwrap_or_default();
    let artist = artist.as_deref().map(str::trim).unwrap_or_default();
    if title.is_empty() || artist.is_empty() {
        return Err(ApiError::MissingMetadata);
    }

    let song = state
        .store
        .insert(NewSong::new(title, artist, upload.file_path()))
        .await?;
    upload.commit();

    info!("Stored \"{}\" by {} as song {}", song.title, song.artist, song.id);
    Ok(Json(song.into()))
}
