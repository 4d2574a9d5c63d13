use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::instrument;

use crate::driver::Config;
use crate::events::{ConnectionState, Event};
use crate::handler::Call;
use crate::id::{GuildId, UserId};
use crate::speakers::{SpeakStream, SpeakerMap};

/// The root voice context: owns every call and the process-wide remote
/// speaker registry.
///
/// Calls are keyed by `(user, guild)`, holding at most one per pair. A call
/// reaching its destroyed state (explicitly, or through a fatal transport
/// error) is dropped from the registry automatically.
pub struct Warbler {
    calls: Arc<Mutex<HashMap<(UserId, GuildId), Arc<Mutex<Call>>>>>,
    config: Config,
    speakers: Arc<SpeakerMap>,
}

impl Warbler {
    /// Creates a voice context with default configuration.
    pub fn new() -> Self {
        Self::with_config(Default::default())
    }

    /// Creates a voice context whose calls share the given configuration.
    pub fn with_config(config: Config) -> Self {
        Warbler {
            calls: Arc::default(),
            config,
            speakers: Arc::default(),
        }
    }

    /// Fetches the call for a `(user, guild)` pair, creating it (in the
    /// disconnected state) if none exists.
    #[instrument(skip(self))]
    pub async fn join<G, U>(&self, guild_id: G, user_id: U) -> Arc<Mutex<Call>>
    where
        G: Into<GuildId> + std::fmt::Debug,
        U: Into<UserId> + std::fmt::Debug,
    {
        let guild_id = guild_id.into();
        let user_id = user_id.into();
        let key = (user_id, guild_id);

        let mut calls = self.calls.lock().await;

        if let Some(call) = calls.get(&key) {
            return Arc::clone(call);
        }

        let call = Call::new_shared(
            guild_id,
            user_id,
            self.config.clone(),
            Arc::clone(&self.speakers),
        );
        let events = call.subscribe();
        let call = Arc::new(Mutex::new(call));

        calls.insert(key, Arc::clone(&call));

        // Prune the registry once the call reaches its terminal state, no
        // matter who destroyed it.
        let registry = Arc::clone(&self.calls);
        tokio::spawn(async move {
            while let Ok(event) = events.recv_async().await {
                if let Event::StateChange {
                    new: ConnectionState::Destroyed,
                    ..
                } = event
                {
                    registry.lock().await.remove(&key);
                    break;
                }
            }
        });

        call
    }

    /// Fetches an existing call, if any.
    pub async fn get<G, U>(&self, guild_id: G, user_id: U) -> Option<Arc<Mutex<Call>>>
    where
        G: Into<GuildId>,
        U: Into<UserId>,
    {
        let key = (user_id.into(), guild_id.into());

        self.calls.lock().await.get(&key).map(Arc::clone)
    }

    /// Destroys a call and removes it from the registry.
    pub async fn remove<G, U>(&self, guild_id: G, user_id: U)
    where
        G: Into<GuildId>,
        U: Into<UserId>,
    {
        let key = (user_id.into(), guild_id.into());

        let call = self.calls.lock().await.remove(&key);
        if let Some(call) = call {
            call.lock().await.destroy();
        }
    }

    /// Routes a session-identity update from the parent chat gateway.
    pub async fn voice_state_update<G, U>(&self, guild_id: G, user_id: U, session_id: String)
    where
        G: Into<GuildId>,
        U: Into<UserId>,
    {
        if let Some(call) = self.get(guild_id, user_id).await {
            call.lock().await.update_session(session_id);
        }
    }

    /// Routes a server assignment from the parent chat gateway.
    pub async fn voice_server_update<G, U>(
        &self,
        guild_id: G,
        user_id: U,
        token: String,
        endpoint: String,
    ) where
        G: Into<GuildId>,
        U: Into<UserId>,
    {
        if let Some(call) = self.get(guild_id, user_id).await {
            call.lock().await.update_server(endpoint, token);
        }
    }

    /// Hands out the open stream of a remote speaker, across every call.
    pub fn get_speak_stream(&self, ssrc: u32) -> Option<SpeakStream> {
        self.speakers.get_stream(ssrc)
    }
}
