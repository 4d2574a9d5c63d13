use serde::{Deserialize, Serialize};

/// Periodic keepalive for the voice websocket.
///
/// The body is a bare integer: the sender's wall clock in milliseconds, which
/// the server echoes back in [`HeartbeatAck`] so round-trip time can be
/// measured.
///
/// [`HeartbeatAck`]: struct.HeartbeatAck.html
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Heartbeat {
    /// Milliseconds since the Unix epoch at the time of sending.
    pub sent_ms: u64,
}
