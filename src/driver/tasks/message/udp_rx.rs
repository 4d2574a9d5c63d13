pub(crate) enum UdpRxMessage {
    Poison,
}
