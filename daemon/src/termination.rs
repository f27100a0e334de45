//! Shutting the daemon down when the process is asked to stop.
//!
//! OS signals are watched on a dedicated thread and broadcast to every [`InterruptReceiver`].
//! The http server stops accepting connections on the first signal and finishes in-flight requests;
//! if three signals arrive before it's done the process exits immediately.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    OsSigInt,
    OsSigQuit,
    OsSigTerm,
    UserInt,
}

const FORCE_QUIT_THRESHOLD: u8 = 3;

/// The receiving side of the interrupt broadcast.
#[derive(Debug)]
pub struct InterruptReceiver {
    interrupt_rx: broadcast::Receiver<Interrupted>,
    stopped: Arc<AtomicBool>,
}

impl InterruptReceiver {
    #[must_use]
    #[inline]
    pub fn new(interrupt_rx: broadcast::Receiver<Interrupted>) -> Self {
        Self {
            interrupt_rx,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A receiver that never receives anything, for servers that are stopped by other means.
    ///
    /// Waiting on it blocks forever.
    #[must_use]
    #[inline]
    pub fn dummy() -> Self {
        let (tx, rx) = broadcast::channel(1);
        // keep the channel open without keeping the sender around
        std::mem::forget(tx);
        Self::new(rx)
    }

    /// Wait for an interrupt signal to be received.
    ///
    /// # Errors
    ///
    /// Fails if every [`Terminator`] has been dropped.
    #[inline]
    pub async fn wait(&mut self) -> Result<Interrupted, broadcast::error::RecvError> {
        let interrupted = self.interrupt_rx.recv().await?;
        self.stopped.store(true, Ordering::SeqCst);
        Ok(interrupted)
    }

    /// Resolves once the server should shut down, for use with
    /// [`axum::serve::Serve::with_graceful_shutdown`].
    #[inline]
    pub async fn shutdown_signal(mut self) {
        match self.wait().await {
            Ok(interrupted) => log::info!("Received {interrupted:?}, shutting down"),
            Err(e) => log::warn!("Interrupt channel closed ({e}), shutting down"),
        }
    }

    #[must_use]
    #[inline]
    pub fn resubscribe(&self) -> Self {
        Self {
            interrupt_rx: self.interrupt_rx.resubscribe(),
            stopped: self.stopped.clone(),
        }
    }

    /// Whether an interrupt was already received by this receiver (or one it was resubscribed from).
    #[must_use]
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// The sending side of the interrupt broadcast.
#[derive(Debug, Clone)]
pub struct Terminator {
    interrupt_tx: broadcast::Sender<Interrupted>,
}

impl Terminator {
    #[must_use]
    #[inline]
    pub const fn new(interrupt_tx: broadcast::Sender<Interrupted>) -> Self {
        Self { interrupt_tx }
    }

    /// Ask every receiver to stop.
    ///
    /// # Errors
    ///
    /// Fails if there are no receivers left.
    #[inline]
    pub fn terminate(&self, interrupted: Interrupted) -> anyhow::Result<()> {
        self.interrupt_tx.send(interrupted)?;
        Ok(())
    }
}

/// Forward OS signals to `terminator` until the process exits.
async fn forward_signals(terminator: Terminator) -> std::io::Result<()> {
    #[cfg(unix)]
    let (mut sigint, mut sigterm, mut sigquit) = (
        signal(SignalKind::interrupt())?,
        signal(SignalKind::terminate())?,
        signal(SignalKind::quit())?,
    );

    let mut received: u8 = 0;
    loop {
        #[cfg(unix)]
        let interrupted = tokio::select! {
            _ = sigint.recv() => Interrupted::OsSigInt,
            _ = sigterm.recv() => Interrupted::OsSigTerm,
            _ = sigquit.recv() => Interrupted::OsSigQuit,
            _ = tokio::signal::ctrl_c() => Interrupted::UserInt,
        };
        #[cfg(not(unix))]
        let interrupted = {
            tokio::signal::ctrl_c().await?;
            Interrupted::UserInt
        };

        received += 1;
        if received >= FORCE_QUIT_THRESHOLD {
            log::warn!("Received {FORCE_QUIT_THRESHOLD} signals, forcefully terminating");
            std::process::exit(1);
        }

        if let Err(e) = terminator.terminate(interrupted) {
            log::warn!("failed to broadcast {interrupted:?}: {e}");
        }
    }
}

/// Create the interrupt broadcast channel and start forwarding OS signals into it.
///
/// # Errors
///
/// Fails if the runtime for the signal thread can't be created.
#[allow(clippy::module_name_repetitions)]
#[inline]
pub fn create_termination() -> std::io::Result<(Terminator, InterruptReceiver)> {
    let (tx, rx) = broadcast::channel(2);
    let terminator = Terminator::new(tx);
    let interrupt = InterruptReceiver::new(rx);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .thread_name("songbox-terminator")
        .build()?;
    let terminator_clone = terminator.clone();

    std::thread::spawn(move || {
        if let Err(e) = rt.block_on(forward_signals(terminator_clone)) {
            log::error!("Unable to listen for OS signals: {e}");
        }
    });

    Ok((terminator, interrupt))
}
