use serde::{Deserialize, Serialize};

use crate::protocol_data::ProtocolData;

/// Used to select the voice protocol and encryption mode.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct SelectProtocol {
    /// Client's response to encryption/connection negotiation.
    pub data: ProtocolData,
    /// Transport protocol.
    ///
    /// `"udp"` is the only known accepted value.
    pub protocol: String,
}
