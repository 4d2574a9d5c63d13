use std::time::Duration;

use super::CryptoMode;
use crate::constants::DEFAULT_SILENCE_TIMEOUT;

/// Configuration for the inner driver.
#[derive(Clone, Debug)]
pub struct Config {
    /// Encryption mode requested during protocol selection.
    ///
    /// The handshake fails if the server does not offer this mode, or
    /// answers the selection with a different one.
    pub crypto_mode: CryptoMode,
    /// Quiet period after which a remote speaker's stream is closed and a
    /// speak-end event fires.
    pub silence_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crypto_mode: CryptoMode::Lite,
            silence_timeout: DEFAULT_SILENCE_TIMEOUT,
        }
    }
}
