use crate::provider::ProviderStream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// Opaque identity of one client connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identity for a newly accepted connection
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-connection transcription state, bound to one provider stream
///
/// A reconnect never mutates a context: it builds a new one with a new
/// generation and carries the transcript text over.
pub struct SessionContext {
    /// Identifies the stream instance this context was created for
    generation: u64,

    /// The live provider stream, owned exclusively by this context
    stream: Box<dyn ProviderStream>,

    /// Append-only transcript, seeded with carried-over text
    transcript: Mutex<String>,

    /// Set once when the client asks to finish
    stop_requested: AtomicBool,
}

impl SessionContext {
    pub fn new(generation: u64, stream: Box<dyn ProviderStream>, carry_over: String) -> Self {
        Self {
            generation,
            stream,
            transcript: Mutex::new(carry_over),
            stop_requested: AtomicBool::new(false),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn stream(&self) -> &dyn ProviderStream {
        self.stream.as_ref()
    }

    pub async fn append(&self, fragment: &str) {
        self.transcript.lock().await.push_str(fragment);
    }

    /// Snapshot of everything accumulated so far
    pub async fn transcript(&self) -> String {
        self.transcript.lock().await.clone()
    }

    /// Mark the session as stopping; returns `false` if it already was
    pub fn request_stop(&self) -> bool {
        !self.stop_requested.swap(true, Ordering::SeqCst)
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("generation", &self.generation)
            .field("stop_requested", &self.stop_requested())
            .finish_non_exhaustive()
    }
}
