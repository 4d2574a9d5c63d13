use std::sync::Arc;
use std::time::Duration;

use flume::{Receiver, Sender};
use tracing::instrument;

use crate::driver::{Config, ConnectionError, Driver};
use crate::error::Error;
use crate::events::{ConnectionState, Event, PlayerState};
use crate::id::{GuildId, UserId};
use crate::info::ConnectionProgress;
use crate::input::Input;
use crate::speakers::SpeakerMap;

/// One user's membership of one guild's voice service: the public face of a
/// single connection.
///
/// A call is created in the disconnected state. The parent chat gateway
/// delivers its session identity ([`update_session`]) and server assignment
/// ([`update_server`]) in either order; the first time both are known the
/// handshake begins on its own. Explicitly calling [`connect`] first hands
/// back a completion channel which resolves once the session key arrives.
///
/// [`update_session`]: #method.update_session
/// [`update_server`]: #method.update_server
/// [`connect`]: #method.connect
#[derive(Debug)]
pub struct Call {
    destroyed: bool,
    driver: Driver,
    guild_id: GuildId,
    notify: Option<Sender<Result<(), ConnectionError>>>,
    progress: ConnectionProgress,
    user_id: UserId,
}

impl Call {
    /// Creates a standalone call with its own speaker registry.
    pub fn new(guild_id: GuildId, user_id: UserId) -> Self {
        Self::new_shared(guild_id, user_id, Default::default(), Arc::default())
    }

    pub(crate) fn new_shared(
        guild_id: GuildId,
        user_id: UserId,
        config: Config,
        speakers: Arc<SpeakerMap>,
    ) -> Self {
        Call {
            destroyed: false,
            driver: Driver::with_speakers(config, speakers),
            guild_id,
            notify: None,
            progress: ConnectionProgress::new(guild_id, user_id),
            user_id,
        }
    }

    /// Registers interest in the next connection attempt.
    ///
    /// The returned channel resolves when keys are negotiated and playback
    /// becomes safe, or with the handshake's error. If connection metadata
    /// is already complete, the attempt starts immediately.
    pub fn connect(&mut self) -> Receiver<Result<(), ConnectionError>> {
        let (tx, rx) = flume::bounded(1);

        self.notify = Some(tx);
        self.do_connect();

        rx
    }

    /// Stores the session identity from the parent gateway's state update.
    #[instrument(skip(self, session_id))]
    pub fn update_session(&mut self, session_id: String) {
        if self.destroyed {
            return;
        }

        if self.progress.apply_session_update(session_id) {
            self.do_connect();
        }
    }

    /// Stores the server assignment from the parent gateway's server update.
    #[instrument(skip(self, endpoint, token))]
    pub fn update_server(&mut self, endpoint: String, token: String) {
        if self.destroyed {
            return;
        }

        if self.progress.apply_server_update(endpoint, token) {
            self.do_connect();
        }
    }

    fn do_connect(&mut self) {
        if let Some(info) = self.progress.info() {
            let info = info.clone();
            let tx = match self.notify.take() {
                Some(tx) => tx,
                // Nobody is waiting; the result only needs somewhere to go.
                None => flume::bounded(1).0,
            };

            self.driver.raw_connect(info, tx);
        }
    }

    /// Plays a pre-encoded Opus source, switching at the frame boundary if
    /// one is already live.
    pub fn play(&mut self, source: Input) -> Result<(), Error> {
        self.driver.play(source)
    }

    /// Stops playback: the silence marker goes on the wire, then a
    /// speaking-off announcement.
    pub fn stop(&mut self) {
        self.driver.stop();
    }

    /// Suspends playback; counters and the source survive.
    pub fn pause(&mut self) {
        self.driver.pause();
    }

    /// Resumes paused playback.
    pub fn unpause(&mut self) {
        self.driver.unpause();
    }

    /// Attaches an observer to this call's events.
    pub fn subscribe(&self) -> Receiver<Event> {
        self.driver.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        self.driver.state()
    }

    pub fn player_state(&self) -> PlayerState {
        self.driver.player_state()
    }

    /// Last measured signalling round-trip.
    pub fn ping(&self) -> Option<Duration> {
        self.driver.ping()
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Tears the call down terminally. Further calls are no-ops and emit
    /// nothing.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }

        self.destroyed = true;
        self.notify = None;
        self.driver.destroy();
    }
}
