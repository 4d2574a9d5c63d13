//! Control messages passed between the driver's background tasks.

use flume::Sender;

mod core;
mod events;
mod player;
mod udp_rx;
mod udp_tx;
mod ws;

pub(crate) use self::core::*;
pub(crate) use self::events::*;
pub(crate) use self::player::*;
pub(crate) use self::udp_rx::*;
pub(crate) use self::udp_tx::*;
pub(crate) use self::ws::*;

use crate::events::Event;

/// Handles joining one connection's tasks together.
#[derive(Clone, Debug)]
pub(crate) struct Interconnect {
    pub core: Sender<CoreMessage>,
    pub events: Sender<EventMessage>,
    pub player: Sender<PlayerMessage>,
}

impl Interconnect {
    /// Offers an event to the fan-out task; observers may already be gone.
    pub fn fire(&self, event: Event) {
        let _ = self.events.send(EventMessage::Fire(event));
    }

    /// Shuts down the tasks owned by the core runner.
    pub fn poison(&self) {
        let _ = self.events.send(EventMessage::Poison);
        let _ = self.player.send(PlayerMessage::Poison);
    }
}
