pub(crate) enum UdpTxMessage {
    Packet(Vec<u8>),
    Poison,
}
