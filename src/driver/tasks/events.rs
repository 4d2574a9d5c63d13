use flume::{Receiver, Sender};
use tracing::{info, instrument, trace};

use super::message::EventMessage;
use crate::events::Event;

/// Fans events out to however many observers a call has accumulated.
///
/// Observers whose receiving half has been dropped are pruned on the next
/// delivery.
#[instrument(skip(evt_rx))]
pub(crate) async fn runner(evt_rx: Receiver<EventMessage>) {
    info!("Event processor started.");

    let mut subscribers: Vec<Sender<Event>> = Vec::new();

    while let Ok(msg) = evt_rx.recv_async().await {
        match msg {
            EventMessage::Fire(event) => {
                trace!("Firing {:?} to {} subscriber(s).", event, subscribers.len());
                subscribers.retain(|tx| tx.send(event.clone()).is_ok());
            },
            EventMessage::Subscribe(tx) => {
                subscribers.push(tx);
            },
            EventMessage::Poison => break,
        }
    }

    info!("Event processor finished.");
}
