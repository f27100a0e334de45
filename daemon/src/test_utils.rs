//! utilitites used for testing
//!
//! NOTE: most of the stuff related to setting up store state is in the `songbox_storage` crate
//! behind the `test_utils` feature flag.

use std::{net::SocketAddr, path::Path, sync::Arc};

use tokio::{net::TcpListener, task::JoinHandle};

use songbox_core::config::Settings;
use songbox_storage::db::SongStore;

use crate::{AppState, router, serve, termination::InterruptReceiver};

pub use songbox_core::test_utils::init;

/// Settings whose uploads and client directories live under `root`.
#[must_use]
#[inline]
pub fn test_settings(root: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.daemon.uploads_dir = root.join("uploads");
    settings.daemon.client_dir = root.join("client");
    settings.daemon.db_path = root.join("music.db");
    settings
}

/// A daemon serving on an ephemeral localhost port.
pub struct TestServer {
    pub addr: SocketAddr,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    /// Url of `path` on this server.
    #[must_use]
    #[inline]
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Start serving `store` with `settings` in the background.
///
/// # Errors
///
/// Returns an error if the listener can't be bound or the routes can't be built.
#[inline]
pub async fn init_test_server(
    store: Arc<dyn SongStore>,
    settings: Settings,
) -> anyhow::Result<TestServer> {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
    let addr = listener.local_addr()?;
    let app = router(AppState::new(store, settings))?;
    let handle = tokio::spawn(serve(listener, app, InterruptReceiver::dummy()));
    Ok(TestServer { addr, handle })
}
