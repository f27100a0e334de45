//! Exercises the daemon over http, the way the client talks to it.

use std::{path::Path, sync::Arc};

use pretty_assertions::assert_eq;
use reqwest::{
    StatusCode,
    multipart::{Form, Part},
};
use rstest::rstest;
use serde_json::Value;
use tempfile::TempDir;

use songbox_core::config::{Settings, StoreKind};
use crate::{
    services::songs::UploadResponse,
    test_utils::{TestServer, init, init_test_server, test_settings},
};
use songbox_storage::{
    db::{SongStore, memory::MemoryStore, schemas::song::Song, sqlite::SqliteStore},
    test_utils::{FailingStore, init_test_database},
};

struct Fixture {
    dir: TempDir,
    server: TestServer,
    client: reqwest::Client,
}

impl Fixture {
    fn uploads_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("uploads")
    }
}

async fn start(store: Arc<dyn SongStore>, configure: impl FnOnce(&mut Settings)) -> Fixture {
    init();
    let dir = tempfile::tempdir().unwrap();
    let mut settings = test_settings(dir.path());
    configure(&mut settings);
    std::fs::create_dir_all(&settings.daemon.uploads_dir).unwrap();
    let server = init_test_server(store, settings).await.unwrap();
    Fixture {
        dir,
        server,
        client: reqwest::Client::new(),
    }
}

async fn start_sqlite() -> Fixture {
    start(Arc::new(init_test_database().await.unwrap()), |_| {}).await
}

fn count_files(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(Result::ok)
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() { count_files(&path) } else { 1 }
        })
        .sum()
}

fn song_form(title: &str, artist: &str, bytes: Vec<u8>, file_name: &str, mime: &str) -> Form {
    Form::new()
        .text("title", title.to_owned())
        .text("artist", artist.to_owned())
        .part(
            "song",
            Part::bytes(bytes)
                .file_name(file_name.to_owned())
                .mime_str(mime)
                .unwrap(),
        )
}

async fn upload(fixture: &Fixture, form: Form) -> reqwest::Response {
    fixture
        .client
        .post(fixture.server.url("/api/songs"))
        .multipart(form)
        .send()
        .await
        .unwrap()
}

async fn error_message(response: reqwest::Response) -> String {
    let body: Value = response.json().await.unwrap();
    body["error"].as_str().unwrap_or_default().to_owned()
}

#[tokio::test]
async fn test_upload_stores_file_and_record() {
    let fixture = start_sqlite().await;
    let audio = b"ID3 not really an mp3".to_vec();

    let response = upload(
        &fixture,
        song_form("Blue", "The Band", audio.clone(), "Blue.MP3", "audio/mpeg"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let uploaded: UploadResponse = response.json().await.unwrap();

    assert_eq!(uploaded.title, "Blue");
    assert_eq!(uploaded.artist, "The Band");
    assert!(uploaded.file_path.starts_with("/uploads/"));
    assert!(uploaded.file_path.ends_with(".mp3"));

    // the public path resolves to the stored file
    let stored = Song {
        id: uploaded.id,
        title: uploaded.title.clone(),
        artist: uploaded.artist.clone(),
        file_path: uploaded.file_path.clone(),
        created_at: None,
    };
    let on_disk = stored.local_path(&fixture.uploads_dir()).unwrap();
    assert_eq!(std::fs::read(&on_disk).unwrap(), audio);

    // and is served with a week long cache directive
    let media = fixture
        .client
        .get(fixture.server.url(&uploaded.file_path))
        .send()
        .await
        .unwrap();
    assert_eq!(media.status(), StatusCode::OK);
    assert_eq!(
        media.headers()[reqwest::header::CACHE_CONTROL],
        "public, max-age=604800"
    );
    assert_eq!(media.bytes().await.unwrap().as_ref(), audio.as_slice());

    let songs: Vec<Song> = fixture
        .client
        .get(fixture.server.url("/api/songs"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(songs.len(), 1);
    assert_eq!(songs[0].id, uploaded.id);
    assert_eq!(songs[0].public_path(), uploaded.file_path);
    assert!(songs[0].created_at.is_some());
}

#[tokio::test]
async fn test_list_after_n_uploads() {
    let fixture = start_sqlite().await;

    let mut ids = Vec::new();
    for i in 0..4 {
        let response = upload(
            &fixture,
            song_form(&format!("t{i}"), "a", vec![i; 16], "x.ogg", "audio/ogg"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        ids.push(response.json::<UploadResponse>().await.unwrap().id);
    }

    let songs: Vec<Value> = fixture
        .client
        .get(fixture.server.url("/api/songs"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(songs.len(), 4);
    for (song, id) in songs.iter().zip(&ids) {
        assert_eq!(song["id"].as_i64(), Some(*id));
        for field in ["title", "artist", "file_path", "created_at"] {
            assert!(song.get(field).is_some(), "missing {field} in {song}");
        }
    }
    assert_eq!(count_files(&fixture.uploads_dir()), 4);
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let fixture = start(Arc::new(init_test_database().await.unwrap()), |settings| {
        settings.daemon.max_upload_size = 1024;
    })
    .await;

    let response = upload(
        &fixture,
        song_form("big", "a", vec![0; 4096], "big.mp3", "audio/mpeg"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(error_message(response).await.contains("1024"));
    assert_eq!(count_files(&fixture.uploads_dir()), 0);
}

#[tokio::test]
async fn test_default_upload_limit_is_inclusive() {
    let fixture = start_sqlite().await;
    let limit = Settings::default().daemon.max_upload_size;
    assert_eq!(limit, 10 * 1024 * 1024);
    let limit = usize::try_from(limit).unwrap();

    let response = upload(
        &fixture,
        song_form("full", "a", vec![7; limit], "full.mp3", "audio/mpeg"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let uploaded: UploadResponse = response.json().await.unwrap();
    assert_eq!(count_files(&fixture.uploads_dir()), 1);

    let response = upload(
        &fixture,
        song_form("over", "a", vec![7; limit + 1], "over.mp3", "audio/mpeg"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(error_message(response).await.contains("10485760"));

    assert_eq!(count_files(&fixture.uploads_dir()), 1);
    let songs: Vec<Song> = fixture
        .client
        .get(fixture.server.url("/api/songs"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(songs.len(), 1);
    assert_eq!(songs[0].id, uploaded.id);
    let on_disk = songs[0].local_path(&fixture.uploads_dir()).unwrap();
    assert_eq!(std::fs::metadata(on_disk).unwrap().len(), limit as u64);
}

#[rstest]
#[case("text/plain", "notes.txt")]
#[case("audio/flac", "song.flac")]
#[case("application/octet-stream", "song.mp3")]
#[tokio::test]
async fn test_disallowed_type_is_rejected(#[case] mime: &str, #[case] file_name: &str) {
    let fixture = start_sqlite().await;

    let response = upload(&fixture, song_form("t", "a", vec![1; 32], file_name, mime)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(error_message(response).await.contains(mime));
    assert_eq!(count_files(&fixture.uploads_dir()), 0);
}

#[rstest]
#[case("", "artist")]
#[case("title", "")]
#[case("   ", "artist")]
#[tokio::test]
async fn test_missing_metadata_removes_file(#[case] title: &str, #[case] artist: &str) {
    let fixture = start_sqlite().await;

    let response = upload(
        &fixture,
        song_form(title, artist, vec![1; 32], "a.wav", "audio/wav"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        error_message(response).await,
        "title and artist must not be empty"
    );
    assert_eq!(count_files(&fixture.uploads_dir()), 0);
}

#[tokio::test]
async fn test_missing_file_is_rejected() {
    let fixture = start_sqlite().await;

    let form = Form::new().text("title", "t").text("artist", "a");
    let response = upload(&fixture, form).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        error_message(response).await,
        "please upload a valid audio file"
    );
}

#[tokio::test]
async fn test_store_failure_removes_file() {
    let store = Arc::new(FailingStore::new());
    let fixture = start(store.clone(), |_| {}).await;

    let response = upload(
        &fixture,
        song_form("t", "a", vec![1; 32], "a.mp3", "audio/mpeg"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!error_message(response).await.is_empty());
    assert_eq!(store.attempts(), 1);
    assert_eq!(count_files(&fixture.uploads_dir()), 0);
}

#[tokio::test]
async fn test_health() {
    let fixture = start_sqlite().await;

    let response = fixture
        .client
        .get(fixture.server.url("/api/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();

    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].as_str().is_some_and(|t| t.ends_with('Z')));
    assert!(body.get("environment").is_none());
}

#[tokio::test]
async fn test_health_reports_unavailable_store() {
    let fixture = start(Arc::new(FailingStore::new()), |_| {}).await;

    let response = fixture
        .client
        .get(fixture.server.url("/api/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_demo_mode() {
    let fixture = start(Arc::new(MemoryStore::with_demo_songs()), |settings| {
        settings.daemon.store = StoreKind::Memory;
    })
    .await;

    let health: Value = fixture
        .client
        .get(fixture.server.url("/api/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["environment"], "development");

    let songs: Vec<Value> = fixture
        .client
        .get(fixture.server.url("/api/songs"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(songs.len(), 2);
    assert_eq!(songs[0]["file_path"], "/uploads/demo1.mp3");
    assert!(songs[0].get("created_at").is_none());

    // uploads go through the same pipeline, and get the next id
    let response = upload(
        &fixture,
        song_form("t", "a", vec![1; 32], "a.mp3", "audio/mpeg"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.json::<UploadResponse>().await.unwrap().id, 3);

    let docs = fixture
        .client
        .get(fixture.server.url("/api/docs"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(docs.contains("Environment: development"));
}

#[tokio::test]
async fn test_docs() {
    let fixture = start_sqlite().await;

    let response = fixture
        .client
        .get(fixture.server.url("/api/docs"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let docs = response.text().await.unwrap();

    for endpoint in ["GET /api/health", "GET /api/songs", "POST /api/songs"] {
        assert!(docs.contains(endpoint), "docs are missing {endpoint}");
    }
    assert!(docs.contains("audio/mpeg, audio/wav, audio/ogg"));
    assert!(!docs.contains("Environment:"));
}

#[tokio::test]
async fn test_serves_client_assets() {
    let fixture = start_sqlite().await;
    let client_dir = fixture.dir.path().join("client");
    std::fs::create_dir_all(&client_dir).unwrap();
    std::fs::write(client_dir.join("index.html"), "<h1>songbox</h1>").unwrap();

    let index = fixture
        .client
        .get(fixture.server.url("/"))
        .send()
        .await
        .unwrap();
    assert_eq!(index.status(), StatusCode::OK);
    assert_eq!(index.text().await.unwrap(), "<h1>songbox</h1>");

    let missing = fixture
        .client
        .get(fixture.server.url("/uploads/nope.mp3"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_serves_bundled_client() {
    let bundled = Path::new(env!("CARGO_MANIFEST_DIR")).join("../client");
    let fixture = start(Arc::new(init_test_database().await.unwrap()), |settings| {
        settings.daemon.client_dir = bundled.clone();
    })
    .await;

    let index = fixture
        .client
        .get(fixture.server.url("/"))
        .send()
        .await
        .unwrap();
    assert_eq!(index.status(), StatusCode::OK);
    let page = index.text().await.unwrap();

    assert_eq!(page, std::fs::read_to_string(bundled.join("index.html")).unwrap());
    // skips are debounced, the listing is retried with a timeout, upload failures are reported
    assert!(page.contains("onclick = debounce("));
    assert!(page.contains("fetchWithRetry('/api/songs')"));
    assert!(page.contains("AbortSignal.timeout("));
    assert!(page.contains("Upload failed:"));
}

#[tokio::test]
async fn test_uploads_persist_across_restarts() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(dir.path());

    {
        let store = Arc::new(SqliteStore::open(&settings.daemon.db_path).await.unwrap());
        let server = init_test_server(store.clone(), settings.clone()).await.unwrap();
        let response = reqwest::Client::new()
            .post(server.url("/api/songs"))
            .multipart(song_form("t", "a", vec![1; 8], "a.mp3", "audio/mpeg"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        drop(server);
        store.pool().close().await;
    }

    let store = Arc::new(SqliteStore::open(&settings.daemon.db_path).await.unwrap());
    assert_eq!(store.list_all().await.unwrap().len(), 1);
}
