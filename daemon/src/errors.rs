//! Errors returned by the http handlers.

use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error that is reported to the client as `{"error": "<message>"}`.
#[derive(Error, Debug)]
pub enum ApiError {
    /// No audio file was attached to the upload.
    #[error("please upload a valid audio file")]
    MissingFile,
    #[error("title and artist must not be empty")]
    MissingMetadata,
    #[error("only audio files of type {allowed} may be uploaded, got `{got}`")]
    UnsupportedMediaType { allowed: String, got: String },
    #[error("the uploaded file exceeds the maximum size of {limit} bytes")]
    FileTooLarge { limit: u64 },
    #[error("malformed upload: {0}")]
    Multipart(#[from] MultipartError),
    #[error("{0}")]
    Storage(#[from] songbox_storage::errors::Error),
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    #[must_use]
    #[inline]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingFile
            | Self::MissingMetadata
            | Self::UnsupportedMediaType { .. }
            | Self::FileTooLarge { .. }
            | Self::Multipart(_) => StatusCode::BAD_REQUEST,
            Self::Storage(_) | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    #[inline]
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("{self}");
        } else {
            log::debug!("rejected request: {self}");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
