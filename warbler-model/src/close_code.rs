use std::convert::TryFrom;

/// Close codes delivered when the voice gateway tears down a websocket.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum CloseCode {
    /// Invalid voice opcode sent by the client.
    UnknownOpcode = 4001,

    /// Invalid identification payload sent.
    InvalidPayload = 4002,

    /// A payload was sent prior to identifying.
    NotAuthenticated = 4003,

    /// The token sent with the identify payload was incorrect.
    AuthenticationFailed = 4004,

    /// More than one identify payload was sent.
    AlreadyAuthenticated = 4005,

    /// The session is no longer valid.
    SessionInvalid = 4006,

    /// A session timed out.
    SessionTimeout = 4009,

    /// The server for the last connection attempt could not be found.
    ServerNotFound = 4011,

    /// The gateway did not recognise the voice protocol chosen.
    UnknownProtocol = 4012,

    /// Disconnected, due to channel closure, removal, or kicking.
    ///
    /// Should not reconnect.
    Disconnected = 4014,

    /// The connected voice server crashed; the session is resumable
    /// server-side.
    VoiceServerCrash = 4015,

    /// The gateway didn't recognise the encryption mode.
    UnknownEncryptionMode = 4016,
}

impl CloseCode {
    /// Indicates whether a voice client should attempt to resume its session
    /// in response to this close code.
    ///
    /// Otherwise, the connection should be treated as dead.
    pub fn should_resume(self) -> bool {
        matches!(self, CloseCode::VoiceServerCrash)
    }
}

impl TryFrom<u16> for CloseCode {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        use CloseCode::*;
        Ok(match value {
            4001 => UnknownOpcode,
            4002 => InvalidPayload,
            4003 => NotAuthenticated,
            4004 => AuthenticationFailed,
            4005 => AlreadyAuthenticated,
            4006 => SessionInvalid,
            4009 => SessionTimeout,
            4011 => ServerNotFound,
            4012 => UnknownProtocol,
            4014 => Disconnected,
            4015 => VoiceServerCrash,
            4016 => UnknownEncryptionMode,
            other => return Err(other),
        })
    }
}
