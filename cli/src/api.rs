//! Talking to the songbox daemon over http.
//!
//! Reads go through [`fetch_with_retry`], which bounds every attempt with a timeout and waits a fixed
//! backoff between attempts. Uploads are sent exactly once.

//----------------------------------------------------------------------------------------- std lib
use std::{future::Future, path::Path, time::Duration};
//--------------------------------------------------------------------------------- other libraries
use log::{debug, warn};
use reqwest::{StatusCode, multipart};
use serde::Deserialize;
use tracing::instrument;
//------------------------------------------------------------------------------- SONGBOX libraries
use songbox_core::config::ClientSettings;
use songbox_storage::db::schemas::song::{Song, SongId, public_path};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request timed out after {attempts} attempts")]
    Timeout { attempts: u32 },
    #[error("could not reach the server after {attempts} attempts: {source}")]
    Unreachable {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
    #[error("the server answered with HTTP {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error("the server sent malformed data: {0}")]
    Malformed(String),
    #[error("failed to read {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ClientError {
    /// Things the user can try to get past this error.
    #[must_use]
    pub const fn remediation(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => {
                "check your network connection, browser extensions or proxies, and firewall settings"
            }
            Self::Unreachable { .. } => {
                "make sure the daemon is running, then try disabling ad blockers, using a private window, or a different client"
            }
            Self::Status { .. } | Self::Malformed(_) => {
                "refresh the list, check the daemon logs, or contact the administrator if the problem persists"
            }
            Self::File { .. } => "check that the file exists and is readable",
        }
    }

    /// The message and its remediation, as shown to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        format!("{self} ({})", self.remediation())
    }
}

/// How reads are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts made after the first one failed.
    pub retries: u32,
    /// Upper bound for one attempt.
    pub timeout: Duration,
    /// Wait between two attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ClientSettings::default())
    }
}

impl From<&ClientSettings> for RetryPolicy {
    fn from(settings: &ClientSettings) -> Self {
        Self {
            retries: settings.fetch_retries,
            timeout: settings.fetch_timeout(),
            backoff: settings.retry_backoff(),
        }
    }
}

enum AttemptError {
    Timeout,
    Transport(reqwest::Error),
    Status { status: StatusCode, message: String },
}

/// Run `attempt` until it succeeds or the policy's retries are used up.
///
/// Non-success statuses count as failed attempts, the error of the last attempt is reported.
///
/// # Errors
///
/// Returns the error of the last attempt once all attempts failed.
pub async fn fetch_with_retry<F, Fut>(
    policy: RetryPolicy,
    mut attempt: F,
) -> Result<reqwest::Response, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    let attempts = policy.retries.saturating_add(1);
    let mut last = AttemptError::Timeout;

    for n in 1..=attempts {
        last = match tokio::time::timeout(policy.timeout, attempt()).await {
            Err(_) => AttemptError::Timeout,
            Ok(Err(e)) => AttemptError::Transport(e),
            Ok(Ok(response)) if response.status().is_success() => return Ok(response),
            Ok(Ok(response)) => {
                let status = response.status();
                AttemptError::Status {
                    status,
                    message: error_message(response).await,
                }
            }
        };

        if n < attempts {
            warn!("Attempt {n}/{attempts} failed, retrying in {:?}", policy.backoff);
            tokio::time::sleep(policy.backoff).await;
        }
    }

    Err(match last {
        AttemptError::Timeout => ClientError::Timeout { attempts },
        AttemptError::Transport(source) => ClientError::Unreachable { attempts, source },
        AttemptError::Status { status, message } => ClientError::Status { status, message },
    })
}

/// Pull the `error` field out of a failed response, falling back to the status reason.
async fn error_message(response: reqwest::Response) -> String {
    #[derive(Deserialize)]
    struct Body {
        error: String,
    }

    let status = response.status();
    let fallback = status.canonical_reason().unwrap_or("unknown error").to_string();
    response
        .json::<Body>()
        .await
        .map_or(fallback, |body| body.error)
}

/// What the daemon answers to a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Uploaded {
    pub id: SongId,
    pub title: String,
    pub artist: String,
    /// The url path the media is served at.
    pub file_path: String,
}

/// The content type to send for an audio file, judged by its extension.
#[must_use]
pub fn mime_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("ogg" | "oga") => "audio/ogg",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    policy: RetryPolicy,
}

impl ApiClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>, policy: RetryPolicy) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
            policy,
        }
    }

    #[must_use]
    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self::new(settings.server_url.clone(), RetryPolicy::from(settings))
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// The absolute url a song's media can be streamed from.
    #[must_use]
    pub fn media_url(&self, song: &Song) -> String {
        self.url(&public_path(&song.file_path))
    }

    /// Fetch every stored song.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon can't be reached after retrying, or if it answers with
    /// something that isn't a list of songs.
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn list_songs(&self) -> Result<Vec<Song>, ClientError> {
        let url = self.url("/api/songs");
        let response = fetch_with_retry(self.policy, || self.http.get(&url).send()).await?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ClientError::Malformed(e.to_string()))?;
        if !body.is_array() {
            return Err(ClientError::Malformed("expected a list of songs".into()));
        }
        let songs: Vec<Song> =
            serde_json::from_value(body).map_err(|e| ClientError::Malformed(e.to_string()))?;
        debug!("Fetched {} songs", songs.len());
        Ok(songs)
    }

    /// Ask the daemon how it's doing.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon can't be reached after retrying or reports itself unhealthy.
    pub async fn health(&self) -> Result<serde_json::Value, ClientError> {
        let url = self.url("/api/health");
        let response = fetch_with_retry(self.policy, || self.http.get(&url).send()).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Malformed(e.to_string()))
    }

    /// Upload the audio file at `path` with the given metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can't be read, the daemon can't be reached, or it rejects the upload.
    #[instrument(skip(self))]
    pub async fn upload_song(
        &self,
        title: &str,
        artist: &str,
        path: &Path,
    ) -> Result<Uploaded, ClientError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ClientError::File {
                path: path.display().to_string(),
                source,
            })?;
        let file_name = path
            .file_name()
            .map_or_else(|| "upload".to_string(), |name| name.to_string_lossy().into_owned());

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime_for_path(path))
            .map_err(|e| ClientError::Malformed(e.to_string()))?;
        let form = multipart::Form::new()
            .text("title", title.to_string())
            .text("artist", artist.to_string())
            .part("song", part);

        let response = self
            .http
            .post(self.url("/api/songs"))
            .multipart(form)
            .send()
            .await
            .map_err(|source| ClientError::Unreachable {
                attempts: 1,
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status,
                message: error_message(response).await,
            });
        }
        response
            .json()
            .await
            .map_err(|e| ClientError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use axum::{Json, Router, http::StatusCode as AxumStatus, routing::get};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use songbox_daemon::test_utils::{init_test_server, test_settings};
    use songbox_storage::db::memory::MemoryStore;
    use tokio::net::TcpListener;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            retries: 2,
            timeout: Duration::from_millis(500),
            backoff: Duration::from_millis(10),
        }
    }

    /// Serve `router` on an ephemeral port and return its base url.
    async fn spawn(router: Router) -> anyhow::Result<String> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move { axum::serve(listener, router).await });
        Ok(format!("http://{addr}"))
    }

    #[rstest]
    #[case("song.mp3", "audio/mpeg")]
    #[case("SONG.MP3", "audio/mpeg")]
    #[case("a.wav", "audio/wav")]
    #[case("b.ogg", "audio/ogg")]
    #[case("c.flac", "application/octet-stream")]
    #[case("noext", "application/octet-stream")]
    fn test_mime_for_path(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(mime_for_path(Path::new(path)), expected);
    }

    #[test]
    fn test_policy_from_settings() {
        let policy = RetryPolicy::from(&ClientSettings::default());
        assert_eq!(policy.retries, 3);
        assert_eq!(policy.timeout, Duration::from_secs(5));
        assert_eq!(policy.backoff, Duration::from_secs(1));
    }

    #[test]
    fn test_media_url() {
        let client = ApiClient::new("http://localhost:3000/", RetryPolicy::default());
        let song = Song {
            id: 1,
            title: "t".into(),
            artist: "a".into(),
            file_path: "uploads\\2024\\05\\1.mp3".into(),
            created_at: None,
        };
        assert_eq!(
            client.media_url(&song),
            "http://localhost:3000/uploads/2024/05/1.mp3"
        );
    }

    #[tokio::test]
    async fn test_list_retries_until_success() -> anyhow::Result<()> {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/api/songs",
            get(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err((AxumStatus::SERVICE_UNAVAILABLE, "busy"))
                    } else {
                        Ok(Json(serde_json::json!([
                            {"id": 1, "title": "T", "artist": "A", "file_path": "uploads/x.mp3"}
                        ])))
                    }
                }
            }),
        );
        let client = ApiClient::new(spawn(router).await?, fast_policy());

        let songs = client.list_songs().await?;

        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].title, "T");
        Ok(())
    }

    #[tokio::test]
    async fn test_list_gives_up_after_policy() -> anyhow::Result<()> {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/api/songs",
            get(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { (AxumStatus::INTERNAL_SERVER_ERROR, Json(serde_json::json!({"error": "boom"}))) }
            }),
        );
        let client = ApiClient::new(spawn(router).await?, fast_policy());

        let err = client.list_songs().await.unwrap_err();

        assert_eq!(hits.load(Ordering::SeqCst), 3);
        match err {
            ClientError::Status { status, message } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_slow_server_times_out() -> anyhow::Result<()> {
        let router = Router::new().route(
            "/api/songs",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(serde_json::json!([]))
            }),
        );
        let policy = RetryPolicy {
            retries: 1,
            timeout: Duration::from_millis(50),
            backoff: Duration::from_millis(1),
        };
        let client = ApiClient::new(spawn(router).await?, policy);

        let err = client.list_songs().await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout { attempts: 2 }));
        assert!(err.user_message().contains("network"));
        Ok(())
    }

    #[tokio::test]
    async fn test_non_array_is_malformed() -> anyhow::Result<()> {
        let router = Router::new().route(
            "/api/songs",
            get(|| async { Json(serde_json::json!({"songs": []})) }),
        );
        let client = ApiClient::new(spawn(router).await?, fast_policy());

        let err = client.list_songs().await.unwrap_err();
        assert!(matches!(err, ClientError::Malformed(_)));
        Ok(())
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        // nothing listens on port 9 of localhost
        let client = ApiClient::new("http://127.0.0.1:9", fast_policy());
        let err = client.list_songs().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Unreachable { attempts: 3, .. } | ClientError::Timeout { .. }
        ));
    }

    #[tokio::test]
    async fn test_upload_then_list_against_daemon() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let server =
            init_test_server(Arc::new(MemoryStore::new()), test_settings(dir.path())).await?;
        let client = ApiClient::new(server.url(""), fast_policy());

        let file = dir.path().join("tune.mp3");
        std::fs::write(&file, b"ID3 not really an mp3")?;

        let uploaded = client.upload_song("Tune", "Someone", &file).await?;
        assert_eq!(uploaded.id, 1);
        assert_eq!(uploaded.title, "Tune");
        assert!(uploaded.file_path.starts_with("/uploads/"));

        let songs = client.list_songs().await?;
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].public_path(), uploaded.file_path);

        let media = reqwest::get(client.media_url(&songs[0])).await?;
        assert!(media.status().is_success());
        assert_eq!(media.bytes().await?.as_ref(), b"ID3 not really an mp3");
        Ok(())
    }

    #[tokio::test]
    async fn test_upload_rejected_by_daemon() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let server =
            init_test_server(Arc::new(MemoryStore::new()), test_settings(dir.path())).await?;
        let client = ApiClient::new(server.url(""), fast_policy());

        let file = dir.path().join("notes.txt");
        std::fs::write(&file, b"hello")?;

        let err = client.upload_song("Tune", "Someone", &file).await.unwrap_err();
        match err {
            ClientError::Status { status, .. } => assert_eq!(status, StatusCode::BAD_REQUEST),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(client.list_songs().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_upload_missing_file() {
        let client = ApiClient::new("http://127.0.0.1:9", fast_policy());
        let err = client
            .upload_song("t", "a", Path::new("/definitely/not/here.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::File { .. }));
    }
}
