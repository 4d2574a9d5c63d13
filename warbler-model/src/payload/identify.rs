use serde::{Deserialize, Serialize};

use crate::id::*;

/// Used to begin a voice websocket connection.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Identify {
    /// GuildId which the target voice channel belongs to.
    pub server_id: GuildId,
    /// Session identity received from the parent chat gateway's state update.
    pub session_id: String,
    /// Authentication token received from the parent chat gateway's server
    /// update.
    pub token: String,
    /// UserId of the client who is connecting.
    pub user_id: UserId,
}
