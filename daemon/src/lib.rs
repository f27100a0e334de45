#![deny(clippy::missing_inline_in_public_items)]

//----------------------------------------------------------------------------------------- std lib
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};
//--------------------------------------------------------------------------------- other libraries
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, header},
    routing::get,
};
use log::info;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeader, trace::TraceLayer,
};
//------------------------------------------------------------------------------- SONGBOX libraries
use songbox_core::{
    config::{DaemonSettings, Settings, StoreKind},
    is_server_running,
    logger::{init_logger, init_tracing},
};
use songbox_storage::db::{SongStore, memory::MemoryStore, sqlite::SqliteStore};

#[cfg(test)]
mod api_tests;
pub mod errors;
pub mod services;
pub mod termination;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
pub mod upload;

use termination::InterruptReceiver;

/// Room for the multipart framing and text fields on top of the file itself.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// State shared by every request handler.
#[derive(Clone, Debug)]
pub struct AppState {
    pub store: Arc<dyn SongStore>,
    pub settings: Arc<Settings>,
    /// Whether the daemon is running as the in-memory demo.
    pub demo: bool,
}

impl AppState {
    #[must_use]
    #[inline]
    pub fn new(store: Arc<dyn SongStore>, settings: Settings) -> Self {
        Self {
            demo: settings.daemon.store == StoreKind::Memory,
            store,
            settings: Arc::new(settings),
        }
    }
}

/// Open the song store the settings ask for.
///
/// # Errors
///
/// Returns an error if the SQLite database can't be opened.
#[inline]
pub async fn open_store(settings: &DaemonSettings) -> anyhow::Result<Arc<dyn SongStore>> {
    Ok(match settings.store {
        StoreKind::Sqlite => Arc::new(SqliteStore::open(&settings.db_path).await?),
        StoreKind::Memory => Arc::new(MemoryStore::with_demo_songs()),
    })
}

/// Build the http routes of the daemon.
///
/// # Errors
///
/// Returns an error if the configured media cache header isn't a valid header value.
#[inline]
pub fn router(state: AppState) -> anyhow::Result<Router> {
    let settings = &state.settings.daemon;

    let cache_control =
        HeaderValue::try_from(format!("public, max-age={}", settings.media_max_age))?;
    let media = SetResponseHeader::overriding(
        ServeDir::new(&settings.uploads_dir),
        header::CACHE_CONTROL,
        cache_control,
    );
    let client = ServeDir::new(&settings.client_dir);
    let body_limit = usize::try_from(settings.max_upload_size.saturating_add(MULTIPART_OVERHEAD))
        .unwrap_or(usize::MAX);

    Ok(Router::new()
        .route("/api/health", get(services::health::health))
        .route("/api/docs", get(services::health::docs))
        .route(
            "/api/songs",
            get(services::songs::list_songs).post(services::songs::upload_song),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .nest_service("/uploads", media)
        .fallback_service(client)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Serve `router` on `listener` until `shutdown` receives an interrupt.
///
/// # Errors
///
/// Returns an error if the server fails while running.
#[inline]
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: InterruptReceiver,
) -> anyhow::Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.shutdown_signal())
        .await?;
    Ok(())
}

/// Run the daemon
///
/// also initializes the logger, the song store, and other necessary components.
///
/// # Arguments
///
/// * `settings` - The settings to use.
/// * `log_file_path` - The path to the file where logs will be written.
///
/// # Errors
///
/// If the daemon cannot be started, an error is returned.
#[inline]
pub async fn start_daemon(
    settings: Settings,
    log_file_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let port = settings.daemon.port;

    // Initialize the logger and tracing.
    init_logger(settings.daemon.log_level, log_file_path);
    tracing::subscriber::set_global_default(init_tracing(settings.daemon.log_level))?;

    // check if a server is already running
    if is_server_running(port) {
        anyhow::bail!("A server is already running on port {port}");
    }

    tokio::fs::create_dir_all(&settings.daemon.uploads_dir).await?;
    let store = open_store(&settings.daemon).await?;
    let state = AppState::new(store, settings);

    // initialize the termination handler
    let (_terminator, interrupt_rx) = termination::create_termination()?;

    let listener =
        TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)).await?;
    info!("Listening on http://localhost:{port}");
    info!(
        "Using the {} song store, environment: {}",
        state.store.kind(),
        state.settings.daemon.environment
    );
    if state.demo {
        info!(
            "Running in demo mode with {} demo songs, uploads will not survive a restart",
            state.store.list_all().await?.len()
        );
    }

    serve(listener, router(state)?, interrupt_rx).await?;

    info!("Server shut down");
    Ok(())
}
