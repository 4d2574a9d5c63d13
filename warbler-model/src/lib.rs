//! Mappings of objects exchanged with the chat platform's voice gateway, with
//! implementations for (de)serialisation.
//!
//! Every frame on the signalling channel is a JSON object `{"op": u8, "d": ...}`;
//! [`Event`] models the full set of frames, one payload struct per opcode.

mod close_code;
pub mod constants;
mod event;
pub mod id;
mod opcode;
pub mod payload;
mod protocol_data;
mod speaking_state;
mod util;

pub use self::close_code::CloseCode;
pub use self::event::Event;
pub use self::opcode::Opcode;
pub use self::protocol_data::ProtocolData;
pub use self::speaking_state::SpeakingState;
