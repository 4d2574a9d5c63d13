use serde_repr::{Deserialize_repr, Serialize_repr};

/// Operation codes used on the voice gateway.
#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize_repr, Serialize_repr,
)]
#[non_exhaustive]
#[repr(u8)]
pub enum Opcode {
    /// Used to begin a voice websocket connection.
    Identify = 0,
    /// Used to select the voice protocol and encryption mode.
    SelectProtocol = 1,
    /// Server's response to identification: SSRC, UDP endpoint, offered modes.
    Ready = 2,
    /// Used to keep the websocket connection alive.
    Heartbeat = 3,
    /// Server's confirmation of the negotiated encryption mode, carrying the
    /// session key.
    SessionDescription = 4,
    /// Indicates which users are speaking, or informs the server that the
    /// client is now speaking.
    Speaking = 5,
    /// Server's acknowledgement of a prior heartbeat.
    HeartbeatAck = 6,
    /// Sent after a disconnect to attempt to resume a session.
    Resume = 7,
    /// Used to determine how often the client must send a heartbeat.
    Hello = 8,
    /// Sent by the server if a session could successfully be resumed.
    Resumed = 9,
    /// Another user has connected to the voice channel.
    ClientConnect = 12,
    /// Another user has disconnected from the voice channel.
    ClientDisconnect = 13,
}
