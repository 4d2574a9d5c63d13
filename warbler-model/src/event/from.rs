//! Lifts each payload into its [`Event`] variant, so senders can write
//! `Event::from(Heartbeat { .. })` at call sites.
//!
//! [`Event`]: enum.Event.html

use super::Event;
use crate::payload::*;

macro_rules! event_from {
    ($($payload:ident),* $(,)?) => {
        $(
            impl From<$payload> for Event {
                fn from(body: $payload) -> Self {
                    Event::$payload(body)
                }
            }
        )*
    };
}

event_from!(
    Identify,
    SelectProtocol,
    Ready,
    Heartbeat,
    SessionDescription,
    Speaking,
    HeartbeatAck,
    Resume,
    Hello,
    ClientConnect,
    ClientDisconnect,
);
