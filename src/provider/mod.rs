//! Speech provider stream adapter
//!
//! This module wraps one bidirectional streaming call to the external
//! recognizer and presents a minimal surface to the session manager:
//! - `SpeechProvider::open` establishes a stream and sends its configuration
//! - `ProviderStream` forwards audio and signals end of audio
//! - `EventSink` demultiplexes provider output into result, idle-timeout,
//!   error and completion events, delivered in order on one channel per stream
//! - `TranscodingProvider` puts a decoder process in front of each stream

mod config;
mod error;
mod events;
mod messages;
mod transcode;
mod websocket;

pub use config::{RecognitionConfig, StreamingConfig};
pub use error::{ProviderError, OUT_OF_RANGE};
pub use events::{event_channel, EventSink, EventStream, ProviderEvent};
pub use messages::{ErrorStatus, SpeechAlternative, StreamingResponse, StreamingResult};
pub use transcode::{TranscodeConfig, TranscodingProvider};
pub use websocket::WebSocketProvider;

use anyhow::Result;
use async_trait::async_trait;

/// A connection factory for the external speech-recognition service
///
/// Implementations must not retry a failed `open`; the caller decides
/// whether the failure is fatal.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Open a new recognition stream and send its configuration frame
    ///
    /// Every event produced by the stream is delivered through `events`.
    async fn open(&self, events: EventSink) -> Result<Box<dyn ProviderStream>>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// One live recognition stream
#[async_trait]
pub trait ProviderStream: Send + Sync {
    /// Queue one audio frame for the provider (never blocks)
    fn send_audio(&self, audio: Vec<u8>) -> Result<()>;

    /// Signal that no more audio will be sent
    ///
    /// Final results keep arriving afterwards; `ProviderEvent::Completed`
    /// marks the end of the stream.
    async fn close(&self) -> Result<()>;
}
