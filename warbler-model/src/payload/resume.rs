use serde::{Deserialize, Serialize};

use crate::id::GuildId;

/// Sent by the client after a disconnect to attempt to resume a session.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
pub struct Resume {
    /// GuildId which the target voice channel belongs to.
    pub server_id: GuildId,
    /// Session identity of the connection being resumed.
    pub session_id: String,
    /// Authentication token of the connection being resumed.
    pub token: String,
}
