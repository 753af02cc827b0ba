use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for transcription sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Delay before reopening a provider stream after a hard error
    /// Default: 1000 ms
    pub recovery_backoff_ms: u64,

    /// Binary frames shorter than this are the client's stop signal
    /// Default: 10 bytes
    pub stop_signal_max_bytes: usize,

    /// Largest binary message accepted from a client
    /// Default: 512 KiB
    pub max_message_bytes: usize,
}

impl SessionConfig {
    pub fn recovery_backoff(&self) -> Duration {
        Duration::from_millis(self.recovery_backoff_ms)
    }

    /// Whether a binary frame of `len` bytes means "stop" rather than audio
    pub fn is_stop_signal(&self, len: usize) -> bool {
        len < self.stop_signal_max_bytes
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            recovery_backoff_ms: 1000,
            stop_signal_max_bytes: 10,
            max_message_bytes: 512 * 1024,
        }
    }
}
