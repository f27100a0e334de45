//! Playing through the default audio output with `rodio`.
//!
//! The output stream isn't `Send`, so it lives on a dedicated thread that receives
//! [`Command`]s. Media is downloaded on the tokio runtime and handed to that thread as bytes.

use std::{
    io::Cursor,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
        mpsc::{self, RecvTimeoutError},
    },
    thread,
    time::Duration,
};

use log::{debug, error, warn};
use rodio::{Decoder, OutputStream, Sink, Source};
use tokio::{runtime::Handle, sync::mpsc::UnboundedSender};

use super::backend::{AudioBackend, BackendError, BackendEvent};

/// How often the audio thread reports progress and checks for the end of a song.
const TICK: Duration = Duration::from_millis(250);

enum Command {
    Loaded { generation: u64, bytes: Vec<u8> },
    Play,
    Pause,
    Stop,
    Seek(Duration),
    Volume(f32),
}

#[derive(Debug)]
pub struct RodioBackend {
    commands: mpsc::Sender<Command>,
    events: UnboundedSender<BackendEvent>,
    generation: Arc<AtomicU64>,
    http: reqwest::Client,
    runtime: Handle,
}

impl RodioBackend {
    /// Open the default output device and start the audio thread.
    ///
    /// # Errors
    ///
    /// Returns an error if there's no tokio runtime or the audio thread can't be started.
    pub fn start(events: UnboundedSender<BackendEvent>) -> Result<Self, BackendError> {
        let runtime = Handle::try_current().map_err(|e| BackendError::Unavailable(e.to_string()))?;
        let (commands, rx) = mpsc::channel();
        let generation = Arc::new(AtomicU64::new(0));
        let (ready_tx, ready_rx) = mpsc::channel();

        let thread_events = events.clone();
        let thread_generation = generation.clone();
        thread::Builder::new()
            .name("songbox-audio".into())
            .spawn(move || audio_thread(&rx, &thread_events, &thread_generation, &ready_tx))
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;

        ready_rx
            .recv()
            .map_err(|e| BackendError::Unavailable(e.to_string()))??;

        Ok(Self {
            commands,
            events,
            generation,
            http: reqwest::Client::new(),
            runtime,
        })
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            error!("The audio thread is gone");
        }
    }
}

impl AudioBackend for RodioBackend {
    fn load(&mut self, url: &str) -> Result<(), BackendError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.send(Command::Stop);

        let http = self.http.clone();
        let url = url.to_string();
        let commands = self.commands.clone();
        let events = self.events.clone();
        let current = self.generation.clone();
        self.runtime.spawn(async move {
            let download = async {
                let response = http.get(&url).send().await?.error_for_status()?;
                response.bytes().await
            };
            let result = download.await;
            if current.load(Ordering::SeqCst) != generation {
                debug!("Dropping the stale download of {url}");
                return;
            }
            match result {
                Ok(bytes) => {
                    let _ = commands.send(Command::Loaded {
                        generation,
                        bytes: bytes.to_vec(),
                    });
                }
                Err(e) => {
                    let _ = events.send(BackendEvent::LoadFailed(e.to_string()));
                }
            }
        });
        Ok(())
    }

    fn play(&mut self) -> Result<(), BackendError> {
        self.commands
            .send(Command::Play)
            .map_err(|_| BackendError::Playback("the audio thread is gone".into()))
    }

    fn pause(&mut self) {
        self.send(Command::Pause);
    }

    fn stop(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.send(Command::Stop);
    }

    fn seek(&mut self, position: Duration) {
        self.send(Command::Seek(position));
    }

    fn set_volume(&mut self, volume: f32) {
        self.send(Command::Volume(volume));
    }
}

fn audio_thread(
    commands: &mpsc::Receiver<Command>,
    events: &UnboundedSender<BackendEvent>,
    generation: &AtomicU64,
    ready: &mpsc::Sender<Result<(), BackendError>>,
) {
    let opened = OutputStream::try_default()
        .map_err(|e| BackendError::Unavailable(e.to_string()))
        .and_then(|(stream, handle)| {
            Sink::try_new(&handle)
                .map(|sink| (stream, sink))
                .map_err(|e| BackendError::Unavailable(e.to_string()))
        });
    // the stream has to stay alive for as long as the sink plays
    let (_stream, sink) = match opened {
        Ok(opened) => {
            let _ = ready.send(Ok(()));
            opened
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    let mut loaded = false;
    loop {
        match commands.recv_timeout(TICK) {
            Ok(Command::Loaded {
                generation: loaded_generation,
                bytes,
            }) => {
                if generation.load(Ordering::SeqCst) != loaded_generation {
                    continue;
                }
                sink.clear();
                match Decoder::new(Cursor::new(bytes)) {
                    Ok(source) => {
                        let duration = source.total_duration();
                        sink.append(source);
                        sink.pause();
                        loaded = true;
                        let _ = events.send(BackendEvent::CanPlay { duration });
                    }
                    Err(e) => {
                        loaded = false;
                        let _ = events.send(BackendEvent::LoadFailed(e.to_string()));
                    }
                }
            }
            Ok(Command::Play) => sink.play(),
            Ok(Command::Pause) => sink.pause(),
            Ok(Command::Stop) => {
                sink.clear();
                loaded = false;
            }
            Ok(Command::Seek(position)) => {
                if let Err(e) = sink.try_seek(position) {
                    warn!("Failed to seek: {e}");
                }
            }
            Ok(Command::Volume(volume)) => sink.set_volume(volume),
            Err(RecvTimeoutError::Timeout) => {
                if !loaded || sink.is_paused() {
                    continue;
                }
                if sink.empty() {
                    loaded = false;
                    let _ = events.send(BackendEvent::Ended);
                } else {
                    let _ = events.send(BackendEvent::Progress {
                        position: sink.get_pos(),
                    });
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("Audio thread shutting down");
}
