use flume::Sender;

use crate::events::Event;

pub(crate) enum EventMessage {
    Fire(Event),
    Subscribe(Sender<Event>),
    Poison,
}
