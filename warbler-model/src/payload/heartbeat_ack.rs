use serde::{Deserialize, Serialize};

/// Server acknowledgement of a prior heartbeat, echoing its timestamp.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(transparent)]
pub struct HeartbeatAck {
    /// The millisecond timestamp carried by the heartbeat being acknowledged.
    pub sent_ms: u64,
}
