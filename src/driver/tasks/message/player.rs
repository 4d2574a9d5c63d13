use flume::Sender;

use super::{UdpTxMessage, WsMessage};
use crate::driver::crypto::{Cipher, CryptoMode};
use crate::input::Input;

/// Everything the pacer needs to seal and ship packets for one session.
#[derive(Clone, Debug)]
pub(crate) struct PlayerConnection {
    pub cipher: Cipher,
    pub mode: CryptoMode,
    pub udp_tx: Sender<UdpTxMessage>,
}

pub(crate) enum PlayerMessage {
    /// A session became ready: adopt its cipher, transmit handle, and SSRC.
    SetConn(PlayerConnection, u32),
    /// The session ended; go idle without touching the wire.
    DropConn,
    /// Begin playing a source, or swap sources at the next frame boundary.
    SetSource(Input),
    Stop,
    Pause,
    Unpause,
    /// Where to send speaking updates, once a signalling task exists.
    Ws(Option<Sender<WsMessage>>),
    Poison,
}
