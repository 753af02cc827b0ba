use thiserror::Error;

/// Status code the provider reports when a stream exceeds its maximum
/// duration or receives no audio for too long
pub const OUT_OF_RANGE: i32 = 11;

/// Failures reported by a provider stream
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("failed to connect to speech provider: {0}")]
    Connect(String),

    #[error("speech provider transport error: {0}")]
    Transport(String),

    #[error("speech provider returned status {code}: {message}")]
    Status { code: i32, message: String },

    #[error("unexpected frame from speech provider: {0}")]
    Protocol(String),

    #[error("audio transcoder failed: {0}")]
    Transcoder(String),
}

impl ProviderError {
    /// Whether this failure is the provider's routine stream limit rather
    /// than a fault
    pub fn is_idle_timeout(&self) -> bool {
        match self {
            Self::Status { code, message } => {
                *code == OUT_OF_RANGE || mentions_stream_limit(message)
            }
            _ => false,
        }
    }
}

fn mentions_stream_limit(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("maximum allowed stream duration") || message.contains("audio timeout")
}
