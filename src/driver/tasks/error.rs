/// Background task which could not be reached over its control channel.
///
/// Carried inside [`connection::error::Error::InterconnectFailure`].
///
/// [`connection::error::Error::InterconnectFailure`]:
/// ../../connection/error/enum.Error.html#variant.InterconnectFailure
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Recipient {
    Core,
    Event,
    Player,
    UdpRx,
    UdpTx,
    Ws,
}
