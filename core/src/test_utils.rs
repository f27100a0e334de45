use std::sync::OnceLock;

use crate::logger::{init_logger, init_tracing};

static INIT: OnceLock<()> = OnceLock::new();

/// Set up logging and tracing once for the whole test binary.
///
/// # Panics
///
/// Panics if a global tracing subscriber was already installed by someone else.
pub fn init() {
    INIT.get_or_init(|| {
        init_logger(log::LevelFilter::Debug, None);
        tracing::subscriber::set_global_default(init_tracing(log::LevelFilter::Debug))
            .expect("tracing subscriber already set");
    });
}
