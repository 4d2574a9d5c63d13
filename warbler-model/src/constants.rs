//! Protocol-level constants shared by the voice gateway and its clients.

/// Version of the voice gateway protocol which this crate encodes.
///
/// Selected via the `?v=` query parameter at connection time.
pub const GATEWAY_VERSION: u8 = 4;
