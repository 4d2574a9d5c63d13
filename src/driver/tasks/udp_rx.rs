use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use discortp::rtp::{RtpExtensionPacket, RtpPacket};
use discortp::PacketSize;
use flume::Receiver;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{error, info, instrument, trace, warn};

use super::message::*;
use crate::constants::*;
use crate::driver::crypto::{self, Cipher, CryptoMode};
use crate::events::Event;
use crate::speakers::{PublishOutcome, SpeakerMap};

struct UdpRx {
    cipher: Cipher,
    mode: CryptoMode,
    packet_buffer: [u8; VOICE_PACKET_MAX],
    rx: Receiver<UdpRxMessage>,
    udp_socket: Arc<UdpSocket>,
    speakers: Arc<SpeakerMap>,
    silence_timeout: Duration,
    heard: HashSet<u32>,
}

impl UdpRx {
    #[instrument(skip(self, interconnect))]
    async fn run(&mut self, interconnect: &Interconnect) {
        loop {
            let sweep_at = self
                .speakers
                .next_deadline(self.silence_timeout)
                .unwrap_or_else(|| Instant::now() + self.silence_timeout);

            tokio::select! {
                received = self.udp_socket.recv(&mut self.packet_buffer[..]) => match received {
                    Ok(len) => self.process_datagram(interconnect, len),
                    Err(e) => {
                        error!("Fatal UDP receive error: {:?}.", e);
                        let _ = interconnect.core.send(CoreMessage::FatalUdp(e));
                        break;
                    },
                },
                _ = tokio::time::sleep_until(sweep_at) => {
                    for (user_id, ssrc) in self.speakers.sweep(self.silence_timeout, Instant::now()) {
                        interconnect.fire(Event::SpeakEnd { user_id, ssrc });
                    }
                },
                msg = self.rx.recv_async() => match msg {
                    Ok(UdpRxMessage::Poison) | Err(_) => break,
                },
            }
        }

        // Streams opened during this session end with the session.
        let heard: Vec<u32> = self.heard.iter().copied().collect();
        for (user_id, ssrc) in self.speakers.close_streams(&heard) {
            interconnect.fire(Event::SpeakEnd { user_id, ssrc });
        }
    }

    fn process_datagram(&mut self, interconnect: &Interconnect, len: usize) {
        // Inbound traffic is adversarial: nothing here may panic, and
        // nothing here should tear the connection down. Undecodable or
        // unattributable datagrams are dropped.
        if len <= 8 {
            trace!("Dropping runt datagram of {} bytes.", len);
            return;
        }

        let packet = &mut self.packet_buffer[..len];

        let ssrc = {
            let rtp = match RtpPacket::new(packet) {
                Some(rtp) => rtp,
                None => {
                    warn!("Illegal RTP message received.");
                    return;
                },
            };

            if !rtp_valid(&rtp) {
                warn!("Illegal RTP version or payload type.");
                return;
            }

            rtp.get_ssrc()
        };

        if !self.speakers.is_known(ssrc) {
            trace!("Dropping datagram from unannounced SSRC {}.", ssrc);
            return;
        }

        let (start, payload_len) = match crypto::decrypt_in_place(self.mode, &self.cipher, packet) {
            Ok(bounds) => bounds,
            Err(_) => {
                warn!("RTP decryption failed for SSRC {}.", ssrc);
                interconnect.fire(Event::Error(Arc::new(crate::error::Error::Crypto)));
                return;
            },
        };

        let payload = &packet[start..start + payload_len];
        let frame = strip_extension(payload);

        match self.speakers.publish(ssrc, frame.to_vec(), Instant::now()) {
            PublishOutcome::Opened(user_id) => {
                self.heard.insert(ssrc);
                interconnect.fire(Event::SpeakStart { user_id, ssrc });
            },
            PublishOutcome::Delivered => {},
            PublishOutcome::Unknown => {},
        }
    }
}

/// Skips a leading RTP one-byte-extension block, when one is present in the
/// decrypted payload.
fn strip_extension(data: &[u8]) -> &[u8] {
    if data.len() >= 4 && data[0] == 0xbe && data[1] == 0xde {
        if let Some(ext) = RtpExtensionPacket::new(data) {
            let skip = ext.packet_size();
            if skip <= data.len() {
                return &data[skip..];
            }
        }
    }

    data
}

#[inline]
fn rtp_valid(packet: &RtpPacket<'_>) -> bool {
    packet.get_version() == RTP_VERSION && packet.get_payload_type() == RTP_PROFILE_TYPE
}

#[instrument(skip(interconnect, rx, cipher, udp_socket, speakers))]
pub(crate) async fn runner(
    interconnect: Interconnect,
    rx: Receiver<UdpRxMessage>,
    cipher: Cipher,
    mode: CryptoMode,
    udp_socket: Arc<UdpSocket>,
    speakers: Arc<SpeakerMap>,
    silence_timeout: Duration,
) {
    info!("UDP receive handle started.");

    let mut state = UdpRx {
        cipher,
        mode,
        packet_buffer: [0u8; VOICE_PACKET_MAX],
        rx,
        udp_socket,
        speakers,
        silence_timeout,
        heard: HashSet::new(),
    };

    state.run(&interconnect).await;

    info!("UDP receive handle stopped.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::crypto::{encrypt_in_place, CryptoState};
    use crate::events::Event;
    use crate::id::UserId;
    use discortp::rtp::MutableRtpPacket;
    use xsalsa20poly1305::KEY_SIZE;

    fn test_interconnect() -> (Interconnect, flume::Receiver<EventMessage>) {
        let (core_tx, _core_rx) = flume::unbounded();
        let (evt_tx, evt_rx) = flume::unbounded();
        let (player_tx, _player_rx) = flume::unbounded();

        (
            Interconnect {
                core: core_tx,
                events: evt_tx,
                player: player_tx,
            },
            evt_rx,
        )
    }

    async fn test_rx(mode: CryptoMode, speakers: Arc<SpeakerMap>) -> UdpRx {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let (_tx, rx) = flume::unbounded();

        UdpRx {
            cipher: Cipher::new(mode, &[0u8; KEY_SIZE]).unwrap(),
            mode,
            packet_buffer: [0u8; VOICE_PACKET_MAX],
            rx,
            udp_socket: Arc::new(socket),
            speakers,
            silence_timeout: DEFAULT_SILENCE_TIMEOUT,
            heard: HashSet::new(),
        }
    }

    fn sealed_datagram(
        buffer: &mut [u8],
        mode: CryptoMode,
        cipher: &Cipher,
        sequence: u16,
        timestamp: u32,
        ssrc: u32,
        plaintext: &[u8],
    ) -> usize {
        {
            let mut rtp = MutableRtpPacket::new(buffer).unwrap();
            rtp.set_version(RTP_VERSION);
            rtp.set_payload_type(RTP_PROFILE_TYPE);
            rtp.set_sequence(sequence.into());
            rtp.set_timestamp(timestamp.into());
            rtp.set_ssrc(ssrc);
        }

        let offset = mode.payload_offset();
        buffer[offset..offset + plaintext.len()].copy_from_slice(plaintext);

        let mut state = CryptoState::from(mode);
        encrypt_in_place(&mut state, cipher, buffer, plaintext.len()).unwrap()
    }

    #[test]
    fn extension_blocks_are_stripped() {
        let data = [
            0xBE, 0xDE, 0x00, 0x01, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x00, 0x11,
        ];

        assert_eq!(strip_extension(&data), &[0xEE, 0xFF, 0x00, 0x11]);
    }

    #[test]
    fn extensionless_payloads_pass_through() {
        let data = [0x01, 0x02, 0x03];

        assert_eq!(strip_extension(&data), &data[..]);
    }

    #[tokio::test]
    async fn inbound_datagram_reaches_speaker_stream() {
        let speakers = Arc::new(SpeakerMap::default());
        speakers.register(42, UserId(5));

        let mut rx = test_rx(CryptoMode::Lite, speakers.clone()).await;
        let (interconnect, evt_rx) = test_interconnect();

        let plaintext = [
            0xBE, 0xDE, 0x00, 0x01, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x00, 0x11,
        ];
        let cipher = rx.cipher.clone();
        let len = sealed_datagram(
            &mut rx.packet_buffer,
            CryptoMode::Lite,
            &cipher,
            7,
            960,
            42,
            &plaintext,
        );

        rx.process_datagram(&interconnect, len);

        assert!(matches!(
            evt_rx.try_recv(),
            Ok(EventMessage::Fire(Event::SpeakStart { user_id: UserId(5), ssrc: 42 }))
        ));

        let stream = speakers.get_stream(42).expect("stream should be open");
        assert_eq!(stream.try_recv(), Some(vec![0xEE, 0xFF, 0x00, 0x11]));
    }

    #[tokio::test]
    async fn unknown_ssrcs_are_dropped_silently() {
        let speakers = Arc::new(SpeakerMap::default());
        let mut rx = test_rx(CryptoMode::Lite, speakers.clone()).await;
        let (interconnect, evt_rx) = test_interconnect();

        let cipher = rx.cipher.clone();
        let len = sealed_datagram(
            &mut rx.packet_buffer,
            CryptoMode::Lite,
            &cipher,
            0,
            0,
            99,
            &[0x11; 8],
        );

        rx.process_datagram(&interconnect, len);

        assert!(evt_rx.try_recv().is_err());
        assert!(speakers.get_stream(99).is_none());
    }

    #[tokio::test]
    async fn runt_datagrams_are_dropped_silently() {
        let speakers = Arc::new(SpeakerMap::default());
        let mut rx = test_rx(CryptoMode::Lite, speakers).await;
        let (interconnect, evt_rx) = test_interconnect();

        rx.process_datagram(&interconnect, 8);

        assert!(evt_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn second_datagram_does_not_reopen() {
        let speakers = Arc::new(SpeakerMap::default());
        speakers.register(42, UserId(5));

        let mut rx = test_rx(CryptoMode::Lite, speakers.clone()).await;
        let (interconnect, evt_rx) = test_interconnect();

        let cipher = rx.cipher.clone();
        for _ in 0..2 {
            let len = sealed_datagram(
                &mut rx.packet_buffer,
                CryptoMode::Lite,
                &cipher,
                0,
                0,
                42,
                &[0x22; 4],
            );
            rx.process_datagram(&interconnect, len);
        }

        assert!(matches!(
            evt_rx.try_recv(),
            Ok(EventMessage::Fire(Event::SpeakStart { .. }))
        ));
        assert!(evt_rx.try_recv().is_err());
    }
}
