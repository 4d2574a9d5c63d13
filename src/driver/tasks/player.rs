use std::sync::Arc;
use std::time::Instant;

use discortp::rtp::MutableRtpPacket;
use flume::{Receiver, TryRecvError};
use spin_sleep::SpinSleeper;
use tracing::{info, warn};

use super::message::*;
use crate::constants::*;
use crate::driver::crypto::{self, CryptoMode, CryptoState};
use crate::driver::Shared;
use crate::error::Error;
use crate::events::{ConnectionState, Event, PlayerState};
use crate::input::Input;

/// The send pacer: reads one pre-encoded Opus frame per 20 ms tick, stamps
/// and seals it, and hands the datagram to the transmit task.
///
/// Runs on its own thread so a blocking source read or a busy runtime cannot
/// slip the cadence. While idle or paused it parks on its control channel
/// and burns no cycles.
struct Player {
    conn_active: Option<PlayerConnection>,
    crypto_state: CryptoState,
    deadline: Instant,
    packet: [u8; VOICE_PACKET_MAX],
    rx: Receiver<PlayerMessage>,
    shared: Arc<Shared>,
    sleeper: SpinSleeper,
    source: Option<Input>,
    state: PlayerState,
    ws: Option<flume::Sender<WsMessage>>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Flow {
    Continue,
    Exit,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum CycleOutcome {
    Sent,
    Finished,
    CryptoFailed,
    LostTransport,
}

impl Player {
    fn new(rx: Receiver<PlayerMessage>, shared: Arc<Shared>) -> Self {
        let mut packet = [0u8; VOICE_PACKET_MAX];

        let mut rtp = MutableRtpPacket::new(&mut packet[..])
            .expect("Too few bytes in self.packet for RTP header.");
        rtp.set_version(RTP_VERSION);
        rtp.set_payload_type(RTP_PROFILE_TYPE);
        rtp.set_sequence(rand::random::<u16>().into());
        rtp.set_timestamp(rand::random::<u32>().into());

        Self {
            conn_active: None,
            crypto_state: CryptoState::from(CryptoMode::Lite),
            deadline: Instant::now(),
            packet,
            rx,
            shared,
            sleeper: Default::default(),
            source: None,
            state: PlayerState::Idle,
            ws: None,
        }
    }

    fn run(&mut self, interconnect: &Interconnect) {
        'runner: loop {
            if self.state == PlayerState::Playing {
                loop {
                    match self.rx.try_recv() {
                        Ok(msg) =>
                            if self.handle(interconnect, msg) == Flow::Exit {
                                break 'runner;
                            },
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) => break 'runner,
                    }
                }

                if self.state == PlayerState::Playing {
                    self.cycle(interconnect);
                    self.march_deadline();
                }
            } else {
                match self.rx.recv() {
                    Ok(msg) =>
                        if self.handle(interconnect, msg) == Flow::Exit {
                            break 'runner;
                        },
                    Err(_) => break 'runner,
                }
            }
        }
    }

    fn handle(&mut self, interconnect: &Interconnect, msg: PlayerMessage) -> Flow {
        use PlayerMessage::*;

        match msg {
            SetConn(conn, ssrc) => {
                self.crypto_state = CryptoState::from(conn.mode);
                self.conn_active = Some(conn);

                let mut rtp = MutableRtpPacket::new(&mut self.packet[..])
                    .expect("Too few bytes in self.packet for RTP header.");
                rtp.set_ssrc(ssrc);
            },
            DropConn => {
                self.conn_active = None;
                if self.state != PlayerState::Idle {
                    self.source = None;
                    self.set_state(interconnect, PlayerState::Idle);
                }
            },
            SetSource(input) =>
                if self.state == PlayerState::Playing {
                    // Swapping at the frame boundary: counters and the tick
                    // carry on, the old source is dropped.
                    self.source = Some(input);
                } else if self.conn_active.is_some() {
                    self.source = Some(input);
                    self.send_speaking(true);
                    self.set_state(interconnect, PlayerState::Playing);
                    self.deadline = Instant::now();
                } else {
                    warn!("Discarding source played without a live session.");
                },
            Stop => self.stop(interconnect),
            Pause =>
                if self.state == PlayerState::Playing {
                    self.send_speaking(false);
                    self.set_state(interconnect, PlayerState::Paused);
                },
            Unpause =>
                if self.state == PlayerState::Paused
                    && self.source.is_some()
                    && self.conn_active.is_some()
                {
                    self.send_speaking(true);
                    self.set_state(interconnect, PlayerState::Playing);
                    self.deadline = Instant::now();
                },
            Ws(tx) => self.ws = tx,
            Poison => return Flow::Exit,
        }

        Flow::Continue
    }

    fn cycle(&mut self, interconnect: &Interconnect) {
        if self.shared.state() != ConnectionState::Ready
            || self.conn_active.is_none()
            || self.source.is_none()
        {
            self.stop(interconnect);
            return;
        }

        let mut outcome = CycleOutcome::Sent;

        if let (Some(conn), Some(source)) = (&self.conn_active, &mut self.source) {
            let offset = conn.mode.payload_offset();

            let filled =
                match source.read_frame(&mut self.packet[offset..offset + OPUS_FRAME_SIZE]) {
                    Ok(n) => n,
                    Err(e) => {
                        warn!("Audio source failed: {:?}.", e);
                        0
                    },
                };

            outcome = if filled < OPUS_FRAME_SIZE {
                CycleOutcome::Finished
            } else {
                match crypto::encrypt_in_place(
                    &mut self.crypto_state,
                    &conn.cipher,
                    &mut self.packet[..],
                    OPUS_FRAME_SIZE,
                ) {
                    Ok(total) =>
                        if conn
                            .udp_tx
                            .send(UdpTxMessage::Packet(self.packet[..total].to_vec()))
                            .is_ok()
                        {
                            CycleOutcome::Sent
                        } else {
                            CycleOutcome::LostTransport
                        },
                    Err(_) => CycleOutcome::CryptoFailed,
                }
            };
        }

        match outcome {
            CycleOutcome::Sent => advance_rtp(&mut self.packet),
            CycleOutcome::Finished => self.stop(interconnect),
            CycleOutcome::CryptoFailed => {
                interconnect.fire(Event::Error(Arc::new(Error::Crypto)));
                self.stop(interconnect);
            },
            CycleOutcome::LostTransport => {
                // The transmit task died; its error reaches the core on its
                // own channel.
                self.conn_active = None;
                self.source = None;
                self.set_state(interconnect, PlayerState::Idle);
            },
        }
    }

    fn stop(&mut self, interconnect: &Interconnect) {
        if self.state == PlayerState::Idle {
            return;
        }

        self.source = None;

        if let Some(conn) = &self.conn_active {
            // Bare silence marker: no RTP header, no encryption. The server
            // reads it as an end-of-transmission cue.
            let _ = conn.udp_tx.send(UdpTxMessage::Packet(SILENT_FRAME.to_vec()));
        }

        self.send_speaking(false);
        self.set_state(interconnect, PlayerState::Idle);
    }

    fn send_speaking(&self, speaking: bool) {
        if let Some(ws) = &self.ws {
            let _ = ws.send(WsMessage::Speaking(speaking));
        }
    }

    fn set_state(&mut self, interconnect: &Interconnect, new: PlayerState) {
        if self.state != new {
            let old = self.state;
            self.state = new;
            self.shared.set_player(new);
            interconnect.fire(Event::PlayerStateChange { old, new });
        }
    }

    fn march_deadline(&mut self) {
        let now = Instant::now();
        if self.deadline > now {
            self.sleeper.sleep(self.deadline - now);
        }
        self.deadline += TIMESTEP_LENGTH;
    }
}

/// Advances the pacing counters once a packet is on the wire: sequence by
/// one, timestamp by one frame of samples, both wrapping.
fn advance_rtp(packet: &mut [u8]) {
    let mut rtp =
        MutableRtpPacket::new(packet).expect("Too few bytes in self.packet for RTP header.");

    let sequence: u16 = rtp.get_sequence().into();
    let timestamp: u32 = rtp.get_timestamp().into();

    rtp.set_sequence(sequence.wrapping_add(1).into());
    rtp.set_timestamp(timestamp.wrapping_add(TIMESTAMP_STEP).into());
}

pub(crate) fn runner(rx: Receiver<PlayerMessage>, interconnect: Interconnect, shared: Arc<Shared>) {
    info!("Player started.");

    let mut player = Player::new(rx, shared);
    player.run(&interconnect);

    info!("Player finished.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::crypto::Cipher;
    use discortp::rtp::RtpPacket;
    use xsalsa20poly1305::{KEY_SIZE, TAG_SIZE};

    struct Rig {
        player: Player,
        interconnect: Interconnect,
        udp_rx: Receiver<UdpTxMessage>,
        ws_rx: Receiver<WsMessage>,
        _player_tx: flume::Sender<PlayerMessage>,
        events_rx: Receiver<EventMessage>,
    }

    fn rig() -> Rig {
        let shared = Arc::new(Shared::new());
        shared.set_state(ConnectionState::Ready);

        let (player_tx, player_rx) = flume::unbounded();
        let (core_tx, _core_rx) = flume::unbounded();
        let (events_tx, events_rx) = flume::unbounded();
        let (udp_tx, udp_rx) = flume::unbounded();
        let (ws_tx, ws_rx) = flume::unbounded();

        let interconnect = Interconnect {
            core: core_tx,
            events: events_tx,
            player: player_tx.clone(),
        };

        let mut player = Player::new(player_rx, shared);

        // Pin the randomised counters so expected packets are exact.
        {
            let mut rtp = MutableRtpPacket::new(&mut player.packet[..]).unwrap();
            rtp.set_sequence(0u16.into());
            rtp.set_timestamp(0u32.into());
        }

        let conn = PlayerConnection {
            cipher: Cipher::new(CryptoMode::Lite, &[0u8; KEY_SIZE]).unwrap(),
            mode: CryptoMode::Lite,
            udp_tx,
        };
        player.handle(&interconnect, PlayerMessage::SetConn(conn, 1));
        player.handle(&interconnect, PlayerMessage::Ws(Some(ws_tx)));

        Rig {
            player,
            interconnect,
            udp_rx,
            ws_rx,
            _player_tx: player_tx,
            events_rx,
        }
    }

    fn frame_of(byte: u8, frames: usize) -> Input {
        Input::from(vec![byte; OPUS_FRAME_SIZE * frames])
    }

    #[test]
    fn speaking_precedes_first_datagram() {
        let mut r = rig();

        r.player
            .handle(&r.interconnect, PlayerMessage::SetSource(frame_of(0x55, 2)));

        assert!(matches!(r.ws_rx.try_recv(), Ok(WsMessage::Speaking(true))));
        assert!(r.udp_rx.try_recv().is_err());

        r.player.cycle(&r.interconnect);
        assert!(r.udp_rx.try_recv().is_ok());
    }

    #[test]
    fn first_packet_layout_and_counters() {
        let mut r = rig();

        r.player
            .handle(&r.interconnect, PlayerMessage::SetSource(frame_of(0x55, 2)));
        r.player.cycle(&r.interconnect);

        let packet = match r.udp_rx.try_recv() {
            Ok(UdpTxMessage::Packet(p)) => p,
            other => panic!("expected packet, got {:?}", matches!(other, Ok(_))),
        };

        assert_eq!(packet.len(), 12 + TAG_SIZE + OPUS_FRAME_SIZE + 4);
        assert_eq!(
            &packet[..12],
            &[0x80, 0x78, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
        );
        assert_eq!(&packet[packet.len() - 4..], &[0x01, 0x00, 0x00, 0x00]);

        // Counters stamp-then-advance: next header carries (1, 960).
        let rtp = RtpPacket::new(&r.player.packet[..]).unwrap();
        let sequence: u16 = rtp.get_sequence().into();
        let timestamp: u32 = rtp.get_timestamp().into();
        assert_eq!(sequence, 1);
        assert_eq!(timestamp, TIMESTAMP_STEP);
        assert_eq!(r.player.crypto_state, CryptoState::Lite(std::num::Wrapping(1)));
    }

    #[test]
    fn counters_wrap_without_duplicates() {
        let mut r = rig();

        {
            let mut rtp = MutableRtpPacket::new(&mut r.player.packet[..]).unwrap();
            rtp.set_sequence(u16::MAX.into());
            rtp.set_timestamp(4_294_966_656u32.into());
        }

        r.player
            .handle(&r.interconnect, PlayerMessage::SetSource(frame_of(0, 3)));
        r.player.cycle(&r.interconnect);

        let rtp = RtpPacket::new(&r.player.packet[..]).unwrap();
        let sequence: u16 = rtp.get_sequence().into();
        let timestamp: u32 = rtp.get_timestamp().into();
        assert_eq!(sequence, 0);
        // 4294966656 + 960 mod 2^32.
        assert_eq!(timestamp, 320);

        r.player.cycle(&r.interconnect);
        let rtp = RtpPacket::new(&r.player.packet[..]).unwrap();
        let sequence: u16 = rtp.get_sequence().into();
        assert_eq!(sequence, 1);
    }

    #[test]
    fn pause_then_unpause_keeps_sequence_contiguous() {
        let mut r = rig();

        r.player
            .handle(&r.interconnect, PlayerMessage::SetSource(frame_of(0x11, 4)));
        r.player.cycle(&r.interconnect);

        let first = match r.udp_rx.try_recv().unwrap() {
            UdpTxMessage::Packet(p) => p,
            _ => panic!("expected packet"),
        };

        r.player.handle(&r.interconnect, PlayerMessage::Pause);
        assert!(matches!(r.ws_rx.try_recv(), Ok(WsMessage::Speaking(true))));
        assert!(matches!(r.ws_rx.try_recv(), Ok(WsMessage::Speaking(false))));
        assert_eq!(r.player.state, PlayerState::Paused);

        r.player.handle(&r.interconnect, PlayerMessage::Unpause);
        r.player.cycle(&r.interconnect);

        let second = match r.udp_rx.try_recv().unwrap() {
            UdpTxMessage::Packet(p) => p,
            _ => panic!("expected packet"),
        };

        let first_seq = u16::from_be_bytes([first[2], first[3]]);
        let second_seq = u16::from_be_bytes([second[2], second[3]]);
        assert_eq!(second_seq, first_seq.wrapping_add(1));
    }

    #[test]
    fn stop_sends_silence_then_speaking_off() {
        let mut r = rig();

        r.player
            .handle(&r.interconnect, PlayerMessage::SetSource(frame_of(0x11, 4)));
        r.player.cycle(&r.interconnect);
        let _ = r.udp_rx.try_recv();

        r.player.handle(&r.interconnect, PlayerMessage::Stop);

        match r.udp_rx.try_recv() {
            Ok(UdpTxMessage::Packet(p)) => assert_eq!(p, SILENT_FRAME.to_vec()),
            _ => panic!("expected silence frame"),
        }
        assert!(r.udp_rx.try_recv().is_err());

        let _ = r.ws_rx.try_recv();
        assert!(matches!(r.ws_rx.try_recv(), Ok(WsMessage::Speaking(false))));
        assert_eq!(r.player.state, PlayerState::Idle);
    }

    #[test]
    fn source_exhaustion_stops_playback() {
        let mut r = rig();

        // One full frame, then 100 trailing bytes.
        let mut bytes = vec![0x22; OPUS_FRAME_SIZE];
        bytes.extend_from_slice(&[0x22; 100]);
        r.player
            .handle(&r.interconnect, PlayerMessage::SetSource(Input::from(bytes)));

        r.player.cycle(&r.interconnect);
        assert!(matches!(r.udp_rx.try_recv(), Ok(UdpTxMessage::Packet(_))));

        r.player.cycle(&r.interconnect);
        match r.udp_rx.try_recv() {
            Ok(UdpTxMessage::Packet(p)) => assert_eq!(p, SILENT_FRAME.to_vec()),
            _ => panic!("expected silence frame"),
        }
        assert_eq!(r.player.state, PlayerState::Idle);

        let states: Vec<_> = r.events_rx.drain().collect();
        assert!(states.iter().any(|m| matches!(
            m,
            EventMessage::Fire(Event::PlayerStateChange { new: PlayerState::Idle, .. })
        )));
    }

    #[test]
    fn replacing_a_live_source_keeps_the_episode() {
        let mut r = rig();

        r.player
            .handle(&r.interconnect, PlayerMessage::SetSource(frame_of(0x11, 2)));
        r.player.cycle(&r.interconnect);
        let _ = r.udp_rx.try_recv();
        let _ = r.ws_rx.try_recv();

        r.player
            .handle(&r.interconnect, PlayerMessage::SetSource(frame_of(0x33, 2)));

        // No fresh speaking announcement, no state change; playback carries on.
        assert!(r.ws_rx.try_recv().is_err());
        assert_eq!(r.player.state, PlayerState::Playing);

        r.player.cycle(&r.interconnect);
        assert!(matches!(r.udp_rx.try_recv(), Ok(UdpTxMessage::Packet(_))));
    }
}
