pub mod error;

use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;

use discortp::discord::{IpDiscoveryPacket, IpDiscoveryType, MutableIpDiscoveryPacket};
use flume::Sender;
use tokio::net::UdpSocket;
use tracing::{debug, info, instrument};
use url::Url;

use super::crypto::{Cipher, CryptoMode};
use super::tasks::message::*;
use super::tasks::{udp_rx, udp_tx, ws as ws_task};
use super::{Config, Shared};
use crate::constants::*;
use crate::info::ConnectionInfo;
use crate::model::payload::{Identify, Resume, SelectProtocol};
use crate::model::{Event as GatewayEvent, ProtocolData};
use crate::speakers::SpeakerMap;
use crate::ws::{self, ReceiverExt, SenderExt, WsStream};
use error::{Error, Result};

/// A negotiated signalling + RTP session with one voice server.
///
/// Construction performs the entire handshake: identify, hello/ready, IP
/// discovery, protocol selection, and key delivery, then spawns the
/// signalling, receive, and transmit tasks.
pub(crate) struct Connection {
    pub(crate) info: ConnectionInfo,
    pub(crate) ws: Sender<WsMessage>,
    udp_rx: Sender<UdpRxMessage>,
    udp_tx: Sender<UdpTxMessage>,
}

impl Connection {
    pub(crate) async fn new(
        mut info: ConnectionInfo,
        interconnect: &Interconnect,
        config: &Config,
        shared: Arc<Shared>,
        speakers: Arc<SpeakerMap>,
    ) -> Result<Connection> {
        let crypto_mode = config.crypto_mode;

        let url = generate_url(&mut info.endpoint)?;
        let mut client = ws::create_client(url).await?;

        client
            .send_json(&GatewayEvent::from(Identify {
                server_id: info.guild_id.into(),
                session_id: info.session_id.clone(),
                token: info.token.clone(),
                user_id: info.user_id.into(),
            }))
            .await?;

        let mut hello = None;
        let mut ready = None;

        loop {
            let value = match client.recv_json().await? {
                Some(value) => value,
                None => continue,
            };

            match value {
                GatewayEvent::Ready(r) => {
                    ready = Some(r);
                    if hello.is_some() {
                        break;
                    }
                },
                GatewayEvent::Hello(h) => {
                    hello = Some(h);
                    if ready.is_some() {
                        break;
                    }
                },
                other => {
                    debug!("Expected ready/hello; got: {:?}.", other);

                    return Err(Error::ExpectedHandshake);
                },
            }
        }

        let hello =
            hello.expect("Hello packet expected in connection initialisation, but not found.");
        let ready =
            ready.expect("Ready packet expected in connection initialisation, but not found.");

        if !ready
            .modes
            .iter()
            .any(|s| s == crypto_mode.to_request_str())
        {
            return Err(Error::CryptoModeUnavailable);
        }

        let udp = UdpSocket::bind("0.0.0.0:0").await?;
        udp.connect((ready.ip, ready.port)).await?;

        // NAT hole-punch: learn this socket's externally visible endpoint.
        let mut bytes = discovery_request(ready.ssrc);
        udp.send(&bytes).await?;

        let (address, port) = loop {
            let (len, _addr) = udp.recv_from(&mut bytes).await?;
            match parse_discovery_reply(&bytes[..len]) {
                Ok(seen) => break seen,
                // Anything else arriving during this phase is discarded.
                Err(_) => debug!("Non-discovery datagram during IP discovery."),
            }
        };

        client
            .send_json(&GatewayEvent::from(SelectProtocol {
                protocol: "udp".into(),
                data: ProtocolData {
                    address,
                    mode: crypto_mode.to_request_str().into(),
                    port,
                },
            }))
            .await?;

        let cipher = init_cipher(&mut client, crypto_mode).await?;

        info!("Connected to: {}.", info.endpoint);
        info!("WS heartbeat duration {}ms.", hello.heartbeat_interval);

        let (ws_msg_tx, ws_msg_rx) = flume::unbounded();
        let (udp_rx_msg_tx, udp_rx_msg_rx) = flume::unbounded();
        let (udp_tx_msg_tx, udp_tx_msg_rx) = flume::unbounded();

        let udp = Arc::new(udp);
        let ssrc = ready.ssrc;

        interconnect.player.send(PlayerMessage::SetConn(
            PlayerConnection {
                cipher: cipher.clone(),
                mode: crypto_mode,
                udp_tx: udp_tx_msg_tx.clone(),
            },
            ssrc,
        ))?;
        interconnect
            .player
            .send(PlayerMessage::Ws(Some(ws_msg_tx.clone())))?;

        tokio::spawn(ws_task::runner(
            interconnect.clone(),
            ws_msg_rx,
            client,
            ssrc,
            hello.heartbeat_interval,
            shared,
            speakers.clone(),
        ));

        tokio::spawn(udp_rx::runner(
            interconnect.clone(),
            udp_rx_msg_rx,
            cipher,
            crypto_mode,
            Arc::clone(&udp),
            speakers,
            config.silence_timeout,
        ));

        tokio::spawn(udp_tx::runner(
            interconnect.clone(),
            udp_tx_msg_rx,
            ssrc,
            udp,
        ));

        Ok(Connection {
            info,
            ws: ws_msg_tx,
            udp_rx: udp_rx_msg_tx,
            udp_tx: udp_tx_msg_tx,
        })
    }

    /// Re-opens the signalling channel in place after a resumable close,
    /// keeping the negotiated RTP session alive.
    #[instrument(skip(self))]
    pub(crate) async fn reconnect(&mut self) -> Result<()> {
        let url = generate_url(&mut self.info.endpoint)?;
        let mut client = ws::create_client(url).await?;

        client
            .send_json(&GatewayEvent::from(Resume {
                server_id: self.info.guild_id.into(),
                session_id: self.info.session_id.clone(),
                token: self.info.token.clone(),
            }))
            .await?;

        let mut hello = None;
        let mut resumed = false;

        loop {
            let value = match client.recv_json().await? {
                Some(value) => value,
                None => continue,
            };

            match value {
                GatewayEvent::Resumed => {
                    resumed = true;
                    if hello.is_some() {
                        break;
                    }
                },
                GatewayEvent::Hello(h) => {
                    hello = Some(h);
                    if resumed {
                        break;
                    }
                },
                other => {
                    debug!("Expected resumed/hello; got: {:?}.", other);

                    return Err(Error::ExpectedHandshake);
                },
            }
        }

        let hello =
            hello.expect("Hello packet expected in connection resumption, but not found.");

        self.ws.send(WsMessage::SetKeepalive(hello.heartbeat_interval))?;
        self.ws.send(WsMessage::Ws(Box::new(client)))?;

        info!("Reconnected to: {}.", &self.info.endpoint);
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let _ = self.ws.send(WsMessage::Poison);
        let _ = self.udp_rx.send(UdpRxMessage::Poison);
        let _ = self.udp_tx.send(UdpTxMessage::Poison);
        info!("Disconnected.");
    }
}

fn generate_url(endpoint: &mut String) -> Result<Url> {
    if endpoint.ends_with(":80") {
        let len = endpoint.len();

        endpoint.truncate(len - 3);
    }

    Url::parse(&format!("wss://{}/?v={}", endpoint, VOICE_GATEWAY_VERSION))
        .or(Err(Error::EndpointUrl))
}

/// Builds the 74-byte discovery request for this session's SSRC.
fn discovery_request(ssrc: u32) -> [u8; IpDiscoveryPacket::const_packet_size()] {
    let mut bytes = [0; IpDiscoveryPacket::const_packet_size()];

    let mut view = MutableIpDiscoveryPacket::new(&mut bytes[..])
        .expect("Too few bytes in 'bytes' for IPDiscovery packet.");
    view.set_pkt_type(IpDiscoveryType::Request);
    view.set_length(70);
    view.set_ssrc(ssrc);

    bytes
}

/// Parses a discovery response: NUL-terminated address text plus the
/// server-observed source port.
fn parse_discovery_reply(bytes: &[u8]) -> Result<(IpAddr, u16)> {
    let view = IpDiscoveryPacket::new(bytes).ok_or(Error::IllegalDiscoveryResponse)?;

    if view.get_pkt_type() != IpDiscoveryType::Response {
        return Err(Error::IllegalDiscoveryResponse);
    }

    // UDP contents are spoofable: scan for the first NUL rather than assume
    // a well-formed zero tail.
    let nul_byte_index = view
        .get_address_raw()
        .iter()
        .position(|&b| b == 0)
        .ok_or(Error::IllegalIp)?;

    let address_str = std::str::from_utf8(&view.get_address_raw()[..nul_byte_index])
        .map_err(|_| Error::IllegalIp)?;

    let address = IpAddr::from_str(address_str).map_err(|_| Error::IllegalIp)?;

    Ok((address, view.get_port()))
}

async fn init_cipher(client: &mut WsStream, mode: CryptoMode) -> Result<Cipher> {
    loop {
        let value = match client.recv_json().await? {
            Some(value) => value,
            None => continue,
        };

        match value {
            GatewayEvent::SessionDescription(desc) => {
                // The server accepting a different mode than requested is a
                // hard failure, not a silent downgrade.
                if desc.mode != mode.to_request_str() {
                    return Err(Error::CryptoModeInvalid);
                }

                return Cipher::new(mode, &desc.secret_key).ok_or(Error::KeyInvalid);
            },
            other => {
                debug!("Expected session description; got: {:?}.", other);
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_request_layout() {
        let bytes = discovery_request(123);

        assert_eq!(bytes.len(), 74);
        assert_eq!(
            &bytes[..8],
            &[0x00, 0x01, 0x00, 0x46, 0x00, 0x00, 0x00, 0x7B],
        );
        assert!(bytes[8..].iter().all(|&b| b == 0));
    }

    #[test]
    fn discovery_reply_round_trips() {
        let mut bytes = [0u8; IpDiscoveryPacket::const_packet_size()];
        {
            let mut view = MutableIpDiscoveryPacket::new(&mut bytes[..]).unwrap();
            view.set_pkt_type(IpDiscoveryType::Response);
            view.set_length(70);
            view.set_ssrc(123);

            let mut address = [0u8; 64];
            address[..7].copy_from_slice(b"5.6.7.8");
            view.set_address(&address);
            view.set_port(50000);
        }

        let (address, port) = parse_discovery_reply(&bytes[..]).unwrap();
        assert_eq!(address, IpAddr::from_str("5.6.7.8").unwrap());
        assert_eq!(port, 50000);
    }

    #[test]
    fn discovery_requests_are_not_replies() {
        let bytes = discovery_request(123);

        assert!(parse_discovery_reply(&bytes[..]).is_err());
    }

    #[test]
    fn discovery_reply_without_nul_is_rejected() {
        let mut bytes = [0u8; IpDiscoveryPacket::const_packet_size()];
        {
            let mut view = MutableIpDiscoveryPacket::new(&mut bytes[..]).unwrap();
            view.set_pkt_type(IpDiscoveryType::Response);
            view.set_address(&[b'x'; 64]);
        }

        assert!(parse_discovery_reply(&bytes[..]).is_err());
    }

    #[test]
    fn urls_lose_http_ports_and_gain_versions() {
        let mut endpoint = String::from("eu-west42.example.gg:80");
        let url = generate_url(&mut endpoint).unwrap();

        assert_eq!(endpoint, "eu-west42.example.gg");
        assert_eq!(url.as_str(), "wss://eu-west42.example.gg/?v=4");
    }

    #[test]
    fn invalid_endpoints_are_rejected() {
        let mut endpoint = String::from("not an endpoint");

        assert!(matches!(generate_url(&mut endpoint), Err(Error::EndpointUrl)));
    }
}
