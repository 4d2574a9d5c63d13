//! Runner for a voice connection.
//!
//! The driver is a mixed-sync system: connection management, signalling, and
//! ingress run as asynchronous tasks, while packet pacing and encryption live
//! on a dedicated thread so the 20 ms cadence cannot be starved by a busy
//! runtime. Each live connection's state is mutated only by its own task,
//! with flume channels joining them together.

mod config;
pub(crate) mod connection;
pub(crate) mod crypto;
pub(crate) mod tasks;

pub use config::Config;
pub use connection::error::Error as ConnectionError;
pub use crypto::CryptoMode;
pub use tasks::error::Recipient;

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flume::{Receiver, Sender};
use tracing::instrument;

use crate::error::Error;
use crate::events::{ConnectionState, Event, PlayerState};
use crate::info::ConnectionInfo;
use crate::input::Input;
use crate::speakers::{SpeakStream, SpeakerMap};
use tasks::message::CoreMessage;

const PING_UNKNOWN: u32 = u32::MAX;

/// Connection facts shared between the driver's tasks and its handle:
/// written by exactly one task each, read anywhere.
#[derive(Debug)]
pub(crate) struct Shared {
    state: Mutex<ConnectionState>,
    player: Mutex<PlayerState>,
    ping_ms: AtomicU32,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(ConnectionState::Disconnected),
            player: Mutex::new(PlayerState::Idle),
            ping_ms: AtomicU32::new(PING_UNKNOWN),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.lock().expect("state lock poisoned")
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        *self.state.lock().expect("state lock poisoned") = state;
    }

    pub(crate) fn player(&self) -> PlayerState {
        *self.player.lock().expect("player lock poisoned")
    }

    pub(crate) fn set_player(&self, state: PlayerState) {
        *self.player.lock().expect("player lock poisoned") = state;
    }

    pub(crate) fn ping(&self) -> Option<Duration> {
        match self.ping_ms.load(Ordering::Relaxed) {
            PING_UNKNOWN => None,
            ms => Some(Duration::from_millis(ms.into())),
        }
    }

    pub(crate) fn set_ping_ms(&self, ms: u32) {
        self.ping_ms.store(ms.min(PING_UNKNOWN - 1), Ordering::Relaxed);
    }
}

/// The control object for one voice connection: handshaking, playback
/// control, event subscription, and teardown.
///
/// Creating a driver spawns its background tasks; dropping it shuts them
/// down silently, while [`destroy`] tears down with events.
///
/// [`destroy`]: #method.destroy
pub struct Driver {
    config: Config,
    sender: Sender<CoreMessage>,
    shared: Arc<Shared>,
    speakers: Arc<SpeakerMap>,
}

impl Driver {
    /// Creates a standalone driver with its own speaker registry.
    pub fn new(config: Config) -> Self {
        Self::with_speakers(config, Arc::default())
    }

    /// Creates a driver sharing the given speaker registry.
    pub(crate) fn with_speakers(config: Config, speakers: Arc<SpeakerMap>) -> Self {
        let shared = Arc::new(Shared::new());
        let (tx, rx) = flume::unbounded();

        tasks::start(config.clone(), rx, tx.clone(), shared.clone(), speakers.clone());

        Driver {
            config,
            sender: tx,
            shared,
            speakers,
        }
    }

    /// Connects to a voice server with the given session parameters.
    ///
    /// The returned channel resolves once the session key has arrived (the
    /// point from which playback is allowed), or with the handshake error.
    #[instrument(skip(self))]
    pub fn connect(&mut self, info: ConnectionInfo) -> Receiver<Result<(), ConnectionError>> {
        let (tx, rx) = flume::bounded(1);

        self.raw_connect(info, tx);

        rx
    }

    pub(crate) fn raw_connect(
        &mut self,
        info: ConnectionInfo,
        tx: Sender<Result<(), ConnectionError>>,
    ) {
        self.send(CoreMessage::ConnectWithResult(info, tx));
    }

    /// Plays audio from a pre-encoded Opus source.
    ///
    /// If a source is already playing, transmission switches to the new one
    /// at the next frame boundary.
    pub fn play(&mut self, source: Input) -> Result<(), Error> {
        if self.shared.state() != ConnectionState::Ready {
            return Err(Error::NotReady);
        }

        self.send(CoreMessage::Play(source));
        Ok(())
    }

    /// Stops playback, transmitting the silence marker.
    pub fn stop(&mut self) {
        self.send(CoreMessage::Stop);
    }

    /// Suspends playback without discarding the source or pacing counters.
    pub fn pause(&mut self) {
        self.send(CoreMessage::Pause);
    }

    /// Resumes a paused source.
    pub fn unpause(&mut self) {
        self.send(CoreMessage::Unpause);
    }

    /// Attaches an observer to this connection's events.
    pub fn subscribe(&self) -> Receiver<Event> {
        let (tx, rx) = flume::unbounded();
        let _ = self.sender.send(CoreMessage::Subscribe(tx));

        rx
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn player_state(&self) -> PlayerState {
        self.shared.player()
    }

    /// Last measured signalling round-trip, if a heartbeat has been
    /// acknowledged.
    pub fn ping(&self) -> Option<Duration> {
        self.shared.ping()
    }

    /// Hands out the open stream of a remote speaker, if any.
    pub fn get_speak_stream(&self, ssrc: u32) -> Option<SpeakStream> {
        self.speakers.get_stream(ssrc)
    }

    /// Tears the connection down terminally.
    ///
    /// Idempotent: only the first call moves the connection to `Destroyed`
    /// and emits events.
    pub fn destroy(&mut self) {
        self.send(CoreMessage::Destroy);
    }

    /// Sends a message to the core task. A destroyed core is final, so
    /// failures are swallowed.
    fn send(&mut self, message: CoreMessage) {
        let _ = self.sender.send(message);
    }
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("config", &self.config)
            .field("state", &self.shared.state())
            .field("player", &self.shared.player())
            .finish()
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        let _ = self.sender.send(CoreMessage::Poison);
    }
}
