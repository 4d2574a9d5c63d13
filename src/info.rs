use std::fmt;

use crate::id::{GuildId, UserId};

/// Tracks the two halves of connection metadata, which arrive independently
/// from the parent chat gateway.
///
/// A session update carries the `session_id`; a server update carries the
/// `endpoint` and `token`. The first time both are present, the connection
/// may be opened; later updates that change either half call for a fresh
/// handshake.
#[derive(Clone, Debug)]
pub(crate) enum ConnectionProgress {
    Complete(ConnectionInfo),
    Pending(Pending),
}

impl ConnectionProgress {
    pub fn new(guild_id: GuildId, user_id: UserId) -> Self {
        ConnectionProgress::Pending(Pending {
            guild_id,
            user_id,
            endpoint: None,
            session_id: None,
            token: None,
        })
    }

    pub(crate) fn info(&self) -> Option<&ConnectionInfo> {
        match self {
            ConnectionProgress::Complete(info) => Some(info),
            ConnectionProgress::Pending(_) => None,
        }
    }

    /// Records a new session id, returning `true` if the connection should
    /// now be (re)opened.
    pub(crate) fn apply_session_update(&mut self, session_id: String) -> bool {
        match self {
            ConnectionProgress::Complete(c) => {
                let changed = c.session_id != session_id;
                c.session_id = session_id;
                changed
            },
            ConnectionProgress::Pending(p) => {
                p.session_id = Some(session_id);
                self.promote()
            },
        }
    }

    /// Records new server metadata, returning `true` if the connection
    /// should now be (re)opened.
    pub(crate) fn apply_server_update(&mut self, endpoint: String, token: String) -> bool {
        match self {
            ConnectionProgress::Complete(c) => {
                let changed = c.endpoint != endpoint || c.token != token;
                c.endpoint = endpoint;
                c.token = token;
                changed
            },
            ConnectionProgress::Pending(p) => {
                p.endpoint = Some(endpoint);
                p.token = Some(token);
                self.promote()
            },
        }
    }

    fn promote(&mut self) -> bool {
        if let ConnectionProgress::Pending(p) = self {
            if let Some(info) = p.finalise() {
                *self = ConnectionProgress::Complete(info);
                return true;
            }
        }

        false
    }
}

/// Parameters needed to open a signalling channel to a voice server.
#[derive(Clone)]
pub struct ConnectionInfo {
    /// Hostname of the voice websocket gateway assigned to this call.
    pub endpoint: String,
    /// ID of the guild whose voice channel is being joined.
    pub guild_id: GuildId,
    /// Unique string identifying this session for validation purposes.
    pub session_id: String,
    /// Ephemeral secret used to validate the above session.
    pub token: String,
    /// ID of the connecting user.
    pub user_id: UserId,
}

impl fmt::Debug for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionInfo")
            .field("endpoint", &self.endpoint)
            .field("guild_id", &self.guild_id)
            .field("session_id", &self.session_id)
            .field("token", &"<secret>")
            .field("user_id", &self.user_id)
            .finish()
    }
}

#[derive(Clone)]
pub(crate) struct Pending {
    endpoint: Option<String>,
    guild_id: GuildId,
    session_id: Option<String>,
    token: Option<String>,
    user_id: UserId,
}

impl Pending {
    fn finalise(&mut self) -> Option<ConnectionInfo> {
        match (&self.endpoint, &self.session_id, &self.token) {
            (Some(_), Some(_), Some(_)) => Some(ConnectionInfo {
                endpoint: self.endpoint.take().unwrap(),
                session_id: self.session_id.take().unwrap(),
                token: self.token.take().unwrap(),
                guild_id: self.guild_id,
                user_id: self.user_id,
            }),
            _ => None,
        }
    }
}

impl fmt::Debug for Pending {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending")
            .field("endpoint", &self.endpoint)
            .field("session_id", &self.session_id)
            .field("token_is_some", &self.token.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> ConnectionProgress {
        ConnectionProgress::new(GuildId(1), UserId(2))
    }

    #[test]
    fn session_alone_is_not_enough() {
        let mut progress = fresh();
        assert!(!progress.apply_session_update("sess".into()));
        assert!(progress.info().is_none());
    }

    #[test]
    fn server_alone_is_not_enough() {
        let mut progress = fresh();
        assert!(!progress.apply_server_update("eu-west1".into(), "tok".into()));
        assert!(progress.info().is_none());
    }

    #[test]
    fn both_halves_complete_the_info() {
        let mut progress = fresh();
        assert!(!progress.apply_session_update("sess".into()));
        assert!(progress.apply_server_update("eu-west1".into(), "tok".into()));

        let info = progress.info().expect("progress should be complete");
        assert_eq!(info.session_id, "sess");
        assert_eq!(info.endpoint, "eu-west1");
        assert_eq!(info.token, "tok");
        assert_eq!(info.guild_id, GuildId(1));
        assert_eq!(info.user_id, UserId(2));
    }

    #[test]
    fn changed_server_requests_reconnect() {
        let mut progress = fresh();
        progress.apply_session_update("sess".into());
        progress.apply_server_update("eu-west1".into(), "tok".into());

        assert!(!progress.apply_server_update("eu-west1".into(), "tok".into()));
        assert!(progress.apply_server_update("us-east2".into(), "tok".into()));
        assert!(progress.apply_session_update("sess2".into()));
    }
}
