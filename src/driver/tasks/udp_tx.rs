use std::sync::Arc;

use discortp::discord::MutableKeepalivePacket;
use flume::Receiver;
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};
use tracing::{error, info, instrument, trace};

use super::message::*;
use crate::constants::*;

/// Pushes sealed datagrams onto the wire, interleaving SSRC keepalives so
/// the server keeps this socket's NAT mapping warm during silence.
///
/// Any transport error here is fatal to the whole connection.
#[instrument(skip(interconnect, packet_rx, socket))]
pub(crate) async fn runner(
    interconnect: Interconnect,
    packet_rx: Receiver<UdpTxMessage>,
    ssrc: u32,
    socket: Arc<UdpSocket>,
) {
    info!("UDP transmit handle started.");

    let mut keepalive = [0u8; MutableKeepalivePacket::minimum_packet_size()];
    MutableKeepalivePacket::new(&mut keepalive[..])
        .expect("Insufficient bytes given to keepalive packet.")
        .set_ssrc(ssrc);

    let mut next_keepalive = Instant::now() + UDP_KEEPALIVE_GAP;

    loop {
        let inbound = timeout_at(next_keepalive, packet_rx.recv_async()).await;

        let outgoing: &[u8] = match &inbound {
            Err(_) => {
                trace!("Topping up NAT mapping for SSRC {}.", ssrc);
                next_keepalive += UDP_KEEPALIVE_GAP;
                &keepalive[..]
            },
            Ok(Ok(UdpTxMessage::Packet(p))) => &p[..],
            Ok(Ok(UdpTxMessage::Poison)) | Ok(Err(_)) => break,
        };

        if let Err(e) = socket.send(outgoing).await {
            error!("Fatal UDP send error: {:?}.", e);
            let _ = interconnect.core.send(CoreMessage::FatalUdp(e));
            break;
        }
    }

    info!("UDP transmit handle stopped.");
}
