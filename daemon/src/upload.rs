//! Receiving uploaded audio files onto disk.
//!
//! Files land in `<uploads_dir>/<year>/<month>/<unix millis><ext>`. A [`PendingUpload`] owns the
//! written file until the metadata row referencing it exists; if it is dropped before
//! [`PendingUpload::commit`] the file is removed again.

//----------------------------------------------------------------------------------------- std lib
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
//--------------------------------------------------------------------------------- other libraries
use axum::extract::multipart::Field;
use chrono::{DateTime, Datelike, Local};
use log::{debug, warn};
use tokio::{fs::OpenOptions, io::AsyncWriteExt};
use tracing::instrument;
//----------------------------------------------------------------------------------- local modules
use crate::errors::ApiError;
use songbox_storage::db::schemas::song::UPLOADS_PREFIX;

/// Pick the extension (with leading dot, lowercased) of a stored upload.
///
/// Prefers the extension of the name the client sent, falls back to one implied by the content type.
#[must_use]
#[inline]
pub fn extension_for(file_name: Option<&str>, mime: &str) -> String {
    let from_name = file_name
        .map(Path::new)
        .and_then(Path::extension)
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()));

    from_name.unwrap_or_else(|| {
        match mime.trim().to_ascii_lowercase().as_str() {
            "audio/mpeg" | "audio/mp3" => ".mp3",
            "audio/wav" | "audio/x-wav" | "audio/wave" => ".wav",
            "audio/ogg" => ".ogg",
            _ => "",
        }
        .to_string()
    })
}

/// A file that was written to disk but is not yet referenced by a stored song.
#[derive(Debug)]
pub struct PendingUpload {
    path: PathBuf,
    file_path: String,
    committed: bool,
}

impl PendingUpload {
    /// Where the file is on disk.
    #[must_use]
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The path to persist for this file, relative to the site root (`uploads/2024/05/1715000000000.mp3`).
    #[must_use]
    #[inline]
    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// Keep the file, it's referenced by a stored song now.
    #[inline]
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PendingUpload {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed abandoned upload {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove abandoned upload {}: {e}", self.path.display()),
        }
    }
}

/// Create a new, empty file for an upload received at `now`.
///
/// The file is created exclusively, if the name is already taken the timestamp is bumped by a
/// millisecond until a free one is found.
///
/// # Errors
///
/// Returns an error if the directory or file could not be created.
#[inline]
pub async fn create_upload_file(
    uploads_dir: &Path,
    now: DateTime<Local>,
    ext: &str,
) -> std::io::Result<(tokio::fs::File, PendingUpload)> {
    let year = now.year().to_string();
    let month = format!("{:02}", now.month());
    let dir = uploads_dir.join(&year).join(&month);
    tokio::fs::create_dir_all(&dir).await?;

    let mut millis = now.timestamp_millis();
    loop {
        let name = format!("{millis}{ext}");
        let path = dir.join(&name);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => {
                let upload = PendingUpload {
                    path,
                    file_path: format!("{UPLOADS_PREFIX}/{year}/{month}/{name}"),
                    committed: false,
                };
                return Ok((file, upload));
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => millis += 1,
            Err(e) => return Err(e),
        }
    }
}

/// Stream a multipart file field to disk, enforcing `max_size`.
///
/// # Errors
///
/// Returns [`ApiError::FileTooLarge`] once more than `max_size` bytes were received, and
/// an error if the body can't be read or the file can't be written.
/// In every error case the partially written file is removed.
#[instrument(skip(field))]
#[inline]
pub async fn receive_file(
    field: &mut Field<'_>,
    uploads_dir: &Path,
    mime: &str,
    max_size: u64,
) -> Result<PendingUpload, ApiError> {
    let ext = extension_for(field.file_name(), mime);
    let (mut file, upload) = create_upload_file(uploads_dir, Local::now(), &ext).await?;

    let mut written: u64 = 0;
    while let Some(chunk) = field.chunk().await? {
        written += chunk.len() as u64;
        if written > max_size {
            return Err(ApiError::FileTooLarge { limit: max_size });
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    debug!("Received {written} bytes into {}", upload.path().display());
    Ok(upload)
}
