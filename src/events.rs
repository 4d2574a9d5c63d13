//! Typed notifications emitted by a call.
//!
//! Any number of observers may [`subscribe`] to a call; each receives every
//! event over its own channel. Senders never block on slow observers.
//!
//! [`subscribe`]: ../struct.Call.html#method.subscribe

use std::sync::Arc;

use crate::error::Error;
use crate::id::UserId;

/// Lifecycle of a voice connection.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ConnectionState {
    /// No live signalling channel; session and server metadata may still be
    /// pending.
    Disconnected,
    /// Both halves of the connection metadata arrived and the handshake is
    /// underway.
    Connecting,
    /// Keys are negotiated and the data plane may transmit.
    Ready,
    /// The connection was torn down and cannot be revived.
    Destroyed,
}

/// Playback status of the local audio source.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PlayerState {
    /// No source is being transmitted.
    Idle,
    /// A source is transmitting on the 20 ms cadence.
    Playing,
    /// Transmission is suspended; the source and pacing counters are kept.
    Paused,
}

/// Notifications emitted by a call as its state evolves.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum Event {
    /// The connection moved through its lifecycle.
    StateChange {
        old: ConnectionState,
        new: ConnectionState,
    },
    /// The local player started, paused, or stopped.
    PlayerStateChange {
        old: PlayerState,
        new: PlayerState,
    },
    /// A remote speaker's first audio datagram since quiescence arrived; its
    /// stream is now open.
    SpeakStart { user_id: UserId, ssrc: u32 },
    /// A remote speaker fell silent past the configured timeout; its stream
    /// is closed.
    SpeakEnd { user_id: UserId, ssrc: u32 },
    /// A fault was encountered; fatal faults are preceded by teardown.
    Error(Arc<Error>),
}
