use std::convert::TryFrom;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use flume::Receiver;
use tokio::time::{self, Instant};
use tracing::{error, info, instrument, trace, warn};

use super::message::*;
use crate::driver::Shared;
use crate::error::Error;
use crate::events::Event;
use crate::model::payload::{Heartbeat, Speaking};
use crate::model::{CloseCode, Event as GatewayEvent, SpeakingState};
use crate::speakers::SpeakerMap;
use crate::ws::{Error as WsError, ReceiverExt, SenderExt, WsStream};

struct Signalling {
    rx: Receiver<WsMessage>,
    ws_client: WsStream,
    dont_send: bool,

    ssrc: u32,
    heartbeat_interval: Duration,

    speaking: SpeakingState,
    last_heartbeat: Option<u64>,

    shared: Arc<Shared>,
    speakers: Arc<SpeakerMap>,
}

impl Signalling {
    fn new(
        evt_rx: Receiver<WsMessage>,
        ws_client: WsStream,
        ssrc: u32,
        heartbeat_interval: f64,
        shared: Arc<Shared>,
        speakers: Arc<SpeakerMap>,
    ) -> Self {
        Self {
            rx: evt_rx,
            ws_client,
            dont_send: false,

            ssrc,
            heartbeat_interval: Duration::from_secs_f64(heartbeat_interval / 1000.0),

            speaking: SpeakingState::empty(),
            last_heartbeat: None,

            shared,
            speakers,
        }
    }

    #[instrument(skip(self, interconnect))]
    async fn run(&mut self, interconnect: &Interconnect) {
        let mut next_heartbeat = Instant::now() + self.heartbeat_interval;

        loop {
            tokio::select! {
                _ = time::sleep_until(next_heartbeat) => {
                    if let Err(e) = self.send_heartbeat().await {
                        error!("Heartbeat send failure {:?}.", e);
                        let _ = interconnect.core.send(CoreMessage::FatalWs(None));
                        self.dont_send = true;
                    }
                    next_heartbeat = self.next_heartbeat();
                }
                frame = self.ws_client.recv_json_no_timeout(), if !self.dont_send => {
                    match frame {
                        Ok(Some(event)) => self.process_ws(interconnect, event),
                        Ok(None) => {},
                        Err(WsError::Json(e)) => {
                            warn!("Undecodable signalling frame: {:?}.", e);
                            interconnect.fire(Event::Error(Arc::new(
                                Error::Protocol("undecodable signalling frame"),
                            )));
                        },
                        Err(WsError::Closed(frame)) => {
                            self.handle_close(interconnect, frame.map(|f| u16::from(f.code)));
                        },
                        Err(e) => {
                            error!("Websocket receive failed: {:?}.", e);
                            self.handle_close(interconnect, None);
                        },
                    }
                }
                control = self.rx.recv_async() => {
                    match control {
                        Ok(WsMessage::Ws(replacement)) => {
                            self.ws_client = *replacement;
                            next_heartbeat = self.next_heartbeat();
                            self.dont_send = false;
                        },
                        Ok(WsMessage::SetKeepalive(interval_ms)) => {
                            self.heartbeat_interval =
                                Duration::from_secs_f64(interval_ms / 1000.0);
                            next_heartbeat = self.next_heartbeat();
                        },
                        Ok(WsMessage::Speaking(is_speaking)) => {
                            self.announce_speaking(interconnect, is_speaking).await;
                        },
                        Err(_) | Ok(WsMessage::Poison) => {
                            break;
                        },
                    }
                }
            }
        }
    }

    fn next_heartbeat(&self) -> Instant {
        Instant::now() + self.heartbeat_interval
    }

    /// Mirrors the player's speaking state onto the gateway, deduplicating
    /// repeat announcements.
    async fn announce_speaking(&mut self, interconnect: &Interconnect, is_speaking: bool) {
        if self.speaking.contains(SpeakingState::MICROPHONE) == is_speaking || self.dont_send {
            return;
        }

        self.speaking.set(SpeakingState::MICROPHONE, is_speaking);
        info!("Announcing speaking state {:?}.", self.speaking);

        let outcome = self
            .ws_client
            .send_json(&GatewayEvent::from(Speaking {
                delay: Some(0),
                speaking: self.speaking,
                ssrc: self.ssrc,
                user_id: None,
            }))
            .await;

        if let Err(e) = outcome {
            error!("Failed to send speaking update: {:?}.", e);
            let _ = interconnect.core.send(CoreMessage::FatalWs(None));
            self.dont_send = true;
        }
    }

    async fn send_heartbeat(&mut self) -> crate::ws::Result<()> {
        let sent_ms = now_ms();
        self.last_heartbeat = Some(sent_ms);

        trace!("Sending heartbeat at {}.", sent_ms);

        if !self.dont_send {
            self.ws_client
                .send_json(&GatewayEvent::from(Heartbeat { sent_ms }))
                .await?;
        }

        Ok(())
    }

    /// A resumable close re-opens the channel in place; anything else takes
    /// the whole connection down.
    fn handle_close(&mut self, interconnect: &Interconnect, code: Option<u16>) {
        let resumable = code
            .and_then(|c| CloseCode::try_from(c).ok())
            .map(CloseCode::should_resume)
            .unwrap_or(false);

        if resumable {
            info!("Voice websocket closed with code {:?}; resuming session.", code);
            let _ = interconnect.core.send(CoreMessage::Reconnect);
        } else {
            error!("Voice websocket closed with code {:?}.", code);
            let _ = interconnect.core.send(CoreMessage::FatalWs(code));
        }

        self.dont_send = true;
    }

    fn process_ws(&mut self, interconnect: &Interconnect, value: GatewayEvent) {
        match value {
            GatewayEvent::Speaking(ev) => {
                trace!("Speaking update: {:?}.", ev);
                if let Some(user_id) = ev.user_id {
                    self.speakers.register(ev.ssrc, user_id.into());
                }
            },
            GatewayEvent::ClientConnect(ev) => {
                trace!("Client connected: {:?}.", ev);
                self.speakers.register(ev.audio_ssrc, ev.user_id.into());
            },
            GatewayEvent::ClientDisconnect(ev) => {
                trace!("Client disconnected: {:?}.", ev);
                if let Some((ssrc, was_open)) = self.speakers.remove_user(ev.user_id.into()) {
                    if was_open {
                        interconnect.fire(Event::SpeakEnd {
                            user_id: ev.user_id.into(),
                            ssrc,
                        });
                    }
                }
            },
            GatewayEvent::HeartbeatAck(ev) => {
                if let Some(sent_ms) = self.last_heartbeat.take() {
                    if ev.sent_ms == sent_ms {
                        let ping = now_ms().saturating_sub(sent_ms);
                        self.shared.set_ping_ms(ping as u32);
                        trace!("Heartbeat ACK received, rtt {} ms.", ping);
                    } else {
                        warn!(
                            "Heartbeat ACK mismatch! Expected {}, saw {}.",
                            sent_ms, ev.sent_ms
                        );
                    }
                }
            },
            GatewayEvent::Hello(ev) => {
                // A mid-session hello retunes the cadence from the next beat.
                self.heartbeat_interval =
                    Duration::from_secs_f64(ev.heartbeat_interval / 1000.0);
            },
            other => {
                trace!("Received other websocket data: {:?}.", other);
            },
        }
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[instrument(skip(interconnect, evt_rx, ws_client, shared, speakers))]
pub(crate) async fn runner(
    interconnect: Interconnect,
    evt_rx: Receiver<WsMessage>,
    ws_client: WsStream,
    ssrc: u32,
    heartbeat_interval: f64,
    shared: Arc<Shared>,
    speakers: Arc<SpeakerMap>,
) {
    info!("WS task started.");
    let mut signalling =
        Signalling::new(evt_rx, ws_client, ssrc, heartbeat_interval, shared, speakers);

    signalling.run(&interconnect).await;
    info!("WS task finished.");
}
