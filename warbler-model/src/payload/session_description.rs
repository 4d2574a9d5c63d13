use serde::{Deserialize, Serialize};

/// Server's confirmation of a negotiated encryption mode.
///
/// Receipt of this message is the point after which the data plane may
/// encrypt: the session key it carries is used by every subsequent RTP
/// payload.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct SessionDescription {
    /// The negotiated encryption mode.
    pub mode: String,
    /// 32-byte key used for encryption of RTP payloads, supplied as a
    /// numeric array.
    pub secret_key: Vec<u8>,
}
