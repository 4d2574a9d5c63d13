//! Errors surfaced through a call's event stream.

use std::error::Error as StdError;
use std::fmt;
use std::io::Error as IoError;

pub use crate::driver::connection::error::Error as ConnectionError;

/// A fault in a live voice connection.
///
/// Fatal variants ([`SignallingClosed`], [`UdpTransport`]) are emitted after
/// the connection has been destroyed; the rest leave the connection running.
///
/// [`SignallingClosed`]: #variant.SignallingClosed
/// [`UdpTransport`]: #variant.UdpTransport
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// The signalling channel closed with a code the session cannot resume
    /// from, or dropped without a close frame.
    SignallingClosed(Option<u16>),
    /// The UDP transport failed.
    UdpTransport(IoError),
    /// Playback was requested before the session keys were negotiated.
    NotReady,
    /// The encryption primitive rejected a packet.
    Crypto,
    /// Malformed or unexpected protocol traffic; the connection carries on.
    Protocol(&'static str),
    /// (Re)establishing the connection failed.
    Connection(ConnectionError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Error::*;
        match self {
            SignallingClosed(Some(code)) =>
                write!(f, "signalling channel closed with code {}.", code),
            SignallingClosed(None) => write!(f, "signalling channel closed unexpectedly."),
            UdpTransport(e) => write!(f, "voice UDP transport failed ({}).", e),
            NotReady => write!(f, "cannot play audio without UDP info."),
            Crypto => write!(f, "packet encryption/decryption failed."),
            Protocol(what) => write!(f, "protocol violation: {}.", what),
            Connection(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::UdpTransport(e) => Some(e),
            Error::Connection(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConnectionError> for Error {
    fn from(e: ConnectionError) -> Self {
        Error::Connection(e)
    }
}
