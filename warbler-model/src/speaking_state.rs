use bitflags::bitflags;
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

bitflags! {
    /// How a user is transmitting audio, as carried by speaking
    /// announcements in both directions.
    ///
    /// On the wire this is a plain integer; unknown bits from newer servers
    /// are dropped rather than rejected.
    pub struct SpeakingState: u8 {
        /// Ordinary voice transmission, lighting the speaking indicator.
        const MICROPHONE = 1;

        /// Context audio accompanying video; no speaking indicator.
        const SOUNDSHARE = 1 << 1;

        /// Priority speaker, ducking the audio of other speakers.
        const PRIORITY = 1 << 2;
    }
}

impl<'de> Deserialize<'de> for SpeakingState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u8::deserialize(deserializer).map(Self::from_bits_truncate)
    }
}

impl Serialize for SpeakingState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.bits())
    }
}
