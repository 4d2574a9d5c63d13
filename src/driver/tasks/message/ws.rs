use crate::ws::WsStream;

pub(crate) enum WsMessage {
    /// A replacement websocket, freshly resumed.
    Ws(Box<WsStream>),
    /// New heartbeat interval, in milliseconds.
    SetKeepalive(f64),
    /// Announce the local speaking state.
    Speaking(bool),
    Poison,
}
