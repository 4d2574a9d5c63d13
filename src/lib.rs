//! # Warbler
//!
//! A realtime voice client core for chat-platform voice calls, offering:
//!  * the signalling state machine over the platform's voice websocket,
//!    with heartbeat, resume, and session identity;
//!  * an RTP-over-UDP sender holding a strict 20 ms cadence with per-frame
//!    encryption;
//!  * per-speaker demultiplexing and decryption of inbound audio; and
//!  * the UDP IP-discovery handshake bridging the two planes.
//!
//! The library takes one pre-encoded Opus stream in per call and hands raw
//! Opus frames out per remote speaker; encoding, mixing, and the parent chat
//! gateway live upstream.
//!
//! Entry happens through [`Warbler`], the root context owning every
//! [`Call`]; the parent gateway feeds each call its session identity and
//! voice server assignment, and playback is driven with [`Call::play`] and
//! friends.
//!
//! [`Warbler`]: struct.Warbler.html
//! [`Call`]: struct.Call.html
//! [`Call::play`]: struct.Call.html#method.play

pub mod constants;
pub mod driver;
pub mod error;
pub mod events;
mod handler;
pub mod id;
pub(crate) mod info;
pub mod input;
mod manager;
mod speakers;
pub(crate) mod ws;

pub use discortp as packet;
pub use warbler_model as model;

pub use crate::driver::{Config, ConnectionError, CryptoMode, Driver};
pub use crate::error::Error;
pub use crate::events::{ConnectionState, Event, PlayerState};
pub use crate::handler::Call;
pub use crate::info::ConnectionInfo;
pub use crate::input::Input;
pub use crate::manager::Warbler;
pub use crate::speakers::SpeakStream;
