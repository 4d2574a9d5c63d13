//! Connection errors and convenience types.

use std::error::Error as ErrorTrait;
use std::fmt;
use std::io::Error as IoError;

use flume::SendError;
use serde_json::Error as JsonError;
use xsalsa20poly1305::aead::Error as CryptoError;

use crate::driver::tasks::error::Recipient;
use crate::driver::tasks::message::{EventMessage, PlayerMessage, WsMessage};
use crate::ws::Error as WsError;

/// Errors encountered while connecting to a voice server.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// An error occurred during [en/de]cryption of voice packets or key
    /// generation.
    Crypto(CryptoError),
    /// Server did not return the requested crypto mode during negotiation.
    CryptoModeInvalid,
    /// Requested crypto mode was not offered by the server.
    CryptoModeUnavailable,
    /// An indicator that an endpoint URL was invalid.
    EndpointUrl,
    /// The hello/ready handshake was violated.
    ExpectedHandshake,
    /// The server failed to correctly respond to IP discovery.
    IllegalDiscoveryResponse,
    /// Could not parse the server's view of our IP.
    IllegalIp,
    /// Miscellaneous I/O error.
    Io(IoError),
    /// JSON (de)serialization error.
    Json(JsonError),
    /// The session description carried a key of the wrong length.
    KeyInvalid,
    /// Failed to message another background task after connection
    /// establishment.
    InterconnectFailure(Recipient),
    /// Error communicating with the signalling server over websocket.
    Ws(WsError),
}

impl From<CryptoError> for Error {
    fn from(e: CryptoError) -> Self {
        Error::Crypto(e)
    }
}

impl From<IoError> for Error {
    fn from(e: IoError) -> Error {
        Error::Io(e)
    }
}

impl From<JsonError> for Error {
    fn from(e: JsonError) -> Error {
        Error::Json(e)
    }
}

impl From<SendError<EventMessage>> for Error {
    fn from(_e: SendError<EventMessage>) -> Error {
        Error::InterconnectFailure(Recipient::Event)
    }
}

impl From<SendError<PlayerMessage>> for Error {
    fn from(_e: SendError<PlayerMessage>) -> Error {
        Error::InterconnectFailure(Recipient::Player)
    }
}

impl From<SendError<WsMessage>> for Error {
    fn from(_e: SendError<WsMessage>) -> Error {
        Error::InterconnectFailure(Recipient::Ws)
    }
}

impl From<WsError> for Error {
    fn from(e: WsError) -> Error {
        Error::Ws(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to connect to voice server: ")?;
        use Error::*;
        match self {
            Crypto(c) => write!(f, "cryptography error {:?}.", c),
            CryptoModeInvalid => write!(f, "server changed negotiated encryption mode."),
            CryptoModeUnavailable => write!(f, "server did not offer chosen encryption mode."),
            EndpointUrl => write!(f, "endpoint URL received from gateway was invalid."),
            ExpectedHandshake => write!(f, "voice initialisation protocol was violated."),
            IllegalDiscoveryResponse =>
                write!(f, "IP discovery/NAT punching response was invalid."),
            IllegalIp => write!(f, "IP discovery/NAT punching response had bad IP value."),
            Io(i) => write!(f, "I/O failure ({}).", i),
            Json(j) => write!(f, "JSON (de)serialization issue ({}).", j),
            KeyInvalid => write!(f, "session key had an illegal length."),
            InterconnectFailure(r) => write!(f, "failed to contact other task ({:?}).", r),
            Ws(w) => write!(f, "websocket issue ({:?}).", w),
        }
    }
}

impl ErrorTrait for Error {}

/// Convenience type for connection error handling.
pub type Result<T> = std::result::Result<T, Error>;
