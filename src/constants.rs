//! Constants affecting driver function and API handling.

use std::time::Duration;

use discortp::rtp::RtpType;

/// The voice gateway version used by the library.
pub const VOICE_GATEWAY_VERSION: u8 = crate::model::constants::GATEWAY_VERSION;

/// Sample rate of audio carried over the data plane.
pub const SAMPLE_RATE_RAW: usize = 48_000;

/// Number of audio frames/packets to be sent per second.
pub const AUDIO_FRAME_RATE: usize = 50;

/// Length of time between any two audio frames.
pub const TIMESTEP_LENGTH: Duration = Duration::from_millis(1000 / AUDIO_FRAME_RATE as u64);

/// Number of bytes read from an audio source for each transmitted frame.
///
/// A source hands over exactly one pre-encoded Opus frame per read of this
/// size; a shorter read marks the end of the stream.
pub const OPUS_FRAME_SIZE: usize = 960;

/// RTP timestamp advance per transmitted frame: 20 ms of 48 kHz samples.
pub const TIMESTAMP_STEP: u32 = (SAMPLE_RATE_RAW / AUDIO_FRAME_RATE) as u32;

/// Maximum packet size for a voice packet.
///
/// Set a safe amount below the Ethernet MTU to avoid fragmentation/rejection.
pub const VOICE_PACKET_MAX: usize = 1460;

/// Delay between sends of UDP keepalive frames.
///
/// Voice servers drop NAT mappings without periodic traffic; these fire
/// whether or not audio is flowing.
pub const UDP_KEEPALIVE_GAP_MS: u64 = 5_000;

/// Type-converted delay between sends of UDP keepalive frames.
pub const UDP_KEEPALIVE_GAP: Duration = Duration::from_millis(UDP_KEEPALIVE_GAP_MS);

/// Opus silent frame, transmitted bare (no RTP header, no encryption) as an
/// end-of-transmission cue when playback stops.
pub const SILENT_FRAME: [u8; 3] = [0xf8, 0xff, 0xfe];

/// The one (and only) RTP version.
pub const RTP_VERSION: u8 = 2;

/// Profile type used by the voice server's Opus audio traffic.
pub const RTP_PROFILE_TYPE: RtpType = RtpType::Dynamic(120);

/// How long an inbound speaker may stay silent before its stream is closed
/// and a speak-end event fires.
///
/// Overridable through [`Config::silence_timeout`].
///
/// [`Config::silence_timeout`]: ../driver/struct.Config.html#structfield.silence_timeout
pub const DEFAULT_SILENCE_TIMEOUT: Duration = Duration::from_millis(200);

/// User agent sent when opening the signalling websocket.
pub const USER_AGENT: &str = concat!("warbler/", env!("CARGO_PKG_VERSION"));
