use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// The RTP server's connection offer, answering a successful Identify.
///
/// Everything the data plane needs to start the UDP leg lives here: where to
/// send, which SSRC to stamp, and which encryption modes are on the table.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Ready {
    /// Address of the RTP server allocated to this call.
    pub ip: IpAddr,
    /// Encryption modes the server is willing to negotiate.
    pub modes: Vec<String>,
    /// Destination port on the allocated RTP server.
    pub port: u16,
    /// Synchronisation source assigned to this client's outbound audio.
    pub ssrc: u32,
}
