use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// The client's answer to the server's connection offer, sent once IP
/// discovery has established the externally visible endpoint.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct ProtocolData {
    /// IP address of the client as seen by the server, learnt through the
    /// UDP discovery handshake.
    pub address: IpAddr,
    /// The client's chosen encryption mode (from those offered by the
    /// server).
    pub mode: String,
    /// UDP source port of the client as seen by the server, as above.
    pub port: u16,
}
