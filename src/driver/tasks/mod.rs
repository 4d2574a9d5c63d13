pub mod error;
mod events;
pub(crate) mod message;
mod player;
pub(crate) mod udp_rx;
pub(crate) mod udp_tx;
pub(crate) mod ws;

use std::sync::Arc;

use flume::{Receiver, Sender};
use tracing::{error, info, instrument};

use super::connection::Connection;
use super::{Config, Shared};
use crate::error::Error;
use crate::events::{ConnectionState, Event};
use crate::speakers::SpeakerMap;
use message::*;

pub(crate) fn start(
    config: Config,
    rx: Receiver<CoreMessage>,
    tx: Sender<CoreMessage>,
    shared: Arc<Shared>,
    speakers: Arc<SpeakerMap>,
) {
    tokio::spawn(async move {
        info!("Driver started.");
        runner(config, rx, tx, shared, speakers).await;
        info!("Driver finished.");
    });
}

fn start_internals(core: Sender<CoreMessage>, shared: Arc<Shared>) -> Interconnect {
    let (evt_tx, evt_rx) = flume::unbounded();
    let (player_tx, player_rx) = flume::unbounded();

    let interconnect = Interconnect {
        core,
        events: evt_tx,
        player: player_tx,
    };

    tokio::spawn(events::runner(evt_rx));

    let ic = interconnect.clone();
    std::thread::spawn(move || {
        player::runner(player_rx, ic, shared);
    });

    interconnect
}

fn advance_state(
    interconnect: &Interconnect,
    shared: &Shared,
    state: &mut ConnectionState,
    new: ConnectionState,
) {
    if *state != new {
        let old = *state;
        *state = new;
        shared.set_state(new);
        interconnect.fire(Event::StateChange { old, new });
    }
}

#[instrument(skip_all)]
async fn runner(
    config: Config,
    rx: Receiver<CoreMessage>,
    tx: Sender<CoreMessage>,
    shared: Arc<Shared>,
    speakers: Arc<SpeakerMap>,
) {
    let interconnect = start_internals(tx, shared.clone());
    let mut connection: Option<Connection> = None;
    let mut state = ConnectionState::Disconnected;

    while let Ok(msg) = rx.recv_async().await {
        match msg {
            CoreMessage::ConnectWithResult(info, result_tx) => {
                // A fresh handshake replaces any live session outright.
                connection = None;
                let _ = interconnect.player.send(PlayerMessage::DropConn);
                let _ = interconnect.player.send(PlayerMessage::Ws(None));
                advance_state(&interconnect, &shared, &mut state, ConnectionState::Connecting);

                match Connection::new(
                    info,
                    &interconnect,
                    &config,
                    shared.clone(),
                    speakers.clone(),
                )
                .await
                {
                    Ok(conn) => {
                        connection = Some(conn);
                        advance_state(&interconnect, &shared, &mut state, ConnectionState::Ready);
                        // Other side may not be listening: this is fine.
                        let _ = result_tx.send(Ok(()));
                    },
                    Err(why) => {
                        advance_state(
                            &interconnect,
                            &shared,
                            &mut state,
                            ConnectionState::Disconnected,
                        );
                        // See above.
                        let _ = result_tx.send(Err(why));
                    },
                }
            },
            CoreMessage::Reconnect =>
                if let Some(conn) = connection.as_mut() {
                    advance_state(
                        &interconnect,
                        &shared,
                        &mut state,
                        ConnectionState::Disconnected,
                    );

                    match conn.reconnect().await {
                        Ok(()) => {
                            advance_state(
                                &interconnect,
                                &shared,
                                &mut state,
                                ConnectionState::Ready,
                            );
                        },
                        Err(why) => {
                            error!("Resume failed: {}.", why);
                            interconnect
                                .fire(Event::Error(Arc::new(Error::Connection(why))));
                            destroy(&interconnect, &shared, &mut state);
                            break;
                        },
                    }
                },
            CoreMessage::FatalWs(code) => {
                advance_state(&interconnect, &shared, &mut state, ConnectionState::Disconnected);
                interconnect.fire(Event::Error(Arc::new(Error::SignallingClosed(code))));
                destroy(&interconnect, &shared, &mut state);
                break;
            },
            CoreMessage::FatalUdp(e) => {
                interconnect.fire(Event::Error(Arc::new(Error::UdpTransport(e))));
                destroy(&interconnect, &shared, &mut state);
                break;
            },
            CoreMessage::Play(source) => {
                let _ = interconnect.player.send(PlayerMessage::SetSource(source));
            },
            CoreMessage::Stop => {
                let _ = interconnect.player.send(PlayerMessage::Stop);
            },
            CoreMessage::Pause => {
                let _ = interconnect.player.send(PlayerMessage::Pause);
            },
            CoreMessage::Unpause => {
                let _ = interconnect.player.send(PlayerMessage::Unpause);
            },
            CoreMessage::Subscribe(sub) => {
                let _ = interconnect.events.send(EventMessage::Subscribe(sub));
            },
            CoreMessage::Destroy => {
                destroy(&interconnect, &shared, &mut state);
                break;
            },
            CoreMessage::Poison => break,
        }
    }

    // Dropping the connection poisons its ws and UDP tasks; the events task
    // drains anything fired above before its own poison lands.
    drop(connection);
    interconnect.poison();
}

fn destroy(interconnect: &Interconnect, shared: &Shared, state: &mut ConnectionState) {
    let _ = interconnect.player.send(PlayerMessage::DropConn);
    advance_state(interconnect, shared, state, ConnectionState::Destroyed);
}
