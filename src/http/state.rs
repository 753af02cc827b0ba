use crate::provider::SpeechProvider;
use crate::session::{SessionConfig, TranscriptionManager};
use crate::transport::ConnectionRegistry;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Transcription sessions
    pub manager: TranscriptionManager,

    /// Open client sockets
    pub connections: Arc<ConnectionRegistry>,

    /// Session limits (stop signal, message size)
    pub session: SessionConfig,
}

impl AppState {
    pub fn new(provider: Arc<dyn SpeechProvider>, session: SessionConfig) -> Self {
        let connections = Arc::new(ConnectionRegistry::new());
        let manager = TranscriptionManager::new(provider, connections.clone(), &session);

        Self {
            manager,
            connections,
            session,
        }
    }
}
