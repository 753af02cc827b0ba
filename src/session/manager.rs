use super::config::SessionConfig;
use super::context::{SessionContext, SessionId};
use super::registry::SessionRegistry;
use crate::provider::{event_channel, EventStream, ProviderEvent, SpeechProvider};
use crate::transport::{ClientMessage, ClientSink, CloseCode};
use anyhow::{Context, Result};
use futures::future::{BoxFuture, FutureExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Drives provider streams for every connected client
///
/// Cheap to clone; all clones share the same registry.
#[derive(Clone)]
pub struct TranscriptionManager {
    inner: Arc<ManagerInner>,
}

pub(super) struct ManagerInner {
    /// Opens recognition streams
    pub(super) provider: Arc<dyn SpeechProvider>,

    /// Outbound side of client connections
    pub(super) clients: Arc<dyn ClientSink>,

    /// Live contexts and recovery claims
    pub(super) registry: SessionRegistry,

    /// Delay before reopening after a hard error
    pub(super) recovery_backoff: Duration,

    /// Source of stream generations
    generations: AtomicU64,
}

impl TranscriptionManager {
    pub fn new(
        provider: Arc<dyn SpeechProvider>,
        clients: Arc<dyn ClientSink>,
        config: &SessionConfig,
    ) -> Self {
        info!(
            "Transcription manager using {} provider (recovery backoff {:?})",
            provider.name(),
            config.recovery_backoff()
        );

        Self {
            inner: Arc::new(ManagerInner {
                provider,
                clients,
                registry: SessionRegistry::new(),
                recovery_backoff: config.recovery_backoff(),
                generations: AtomicU64::new(0),
            }),
        }
    }

    pub(super) fn inner(&self) -> &ManagerInner {
        &self.inner
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.inner.registry
    }

    /// Start transcription for a newly connected client
    pub async fn start(&self, id: &SessionId) -> Result<()> {
        self.start_with(id, String::new()).await
    }

    /// Start transcription with the transcript pre-seeded by `carry_over`
    ///
    /// Does nothing if the session already has a context. An `Err` means the
    /// provider stream could not be opened.
    pub async fn start_with(&self, id: &SessionId, carry_over: String) -> Result<()> {
        if self.inner.registry.contains(id) {
            debug!("Session {} already has a provider stream", id);
            return Ok(());
        }

        let generation = self.inner.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let (events, event_stream) = event_channel();

        let stream = self
            .inner
            .provider
            .open(events)
            .await
            .with_context(|| format!("Failed to start transcription for session {}", id))?;

        let carried = carry_over.chars().count();
        let context = Arc::new(SessionContext::new(generation, stream, carry_over));

        if let Err(rejected) = self
            .inner
            .registry
            .insert_if_absent(id.clone(), Arc::clone(&context))
        {
            warn!("Session {} was started concurrently, discarding extra stream", id);
            if let Err(e) = rejected.stream().close().await {
                warn!("Failed to close discarded stream for {}: {}", id, e);
            }
            return Ok(());
        }

        tokio::spawn(
            self.clone()
                .dispatch_events(id.clone(), generation, event_stream),
        );

        info!(
            "Session {} streaming (generation {}, {} chars carried over)",
            id, generation, carried
        );

        Ok(())
    }

    /// Forward one audio frame to the session's provider stream
    pub fn route_audio(&self, id: &SessionId, audio: Vec<u8>) {
        let Some(context) = self.inner.registry.get(id) else {
            debug!("Dropping {} bytes of audio for inactive session {}", audio.len(), id);
            return;
        };

        if let Err(e) = context.stream().send_audio(audio) {
            debug!("Audio for session {} not forwarded: {}", id, e);
        }
    }

    /// Client asked to finish; the transcript is delivered once the
    /// provider stream completes
    pub async fn request_stop(&self, id: &SessionId) {
        let Some(context) = self.inner.registry.get(id) else {
            debug!("Stop requested for inactive session {}", id);
            return;
        };

        if !context.request_stop() {
            debug!("Stop already requested for session {}", id);
            return;
        }

        info!("Stop requested for session {}, closing provider stream", id);
        if let Err(e) = context.stream().close().await {
            warn!("Failed to close provider stream for {}: {}", id, e);
        }
    }

    /// The client connection went away without a stop request
    pub async fn abnormal_close(&self, id: &SessionId) {
        self.inner.registry.release_recovery(id);

        match self.detach(id).await {
            Some(_) => info!("Session {} closed abnormally, resources released", id),
            None => debug!("Abnormal close for inactive session {}", id),
        }
    }

    /// Transcript accumulated so far, if the session is active
    pub async fn transcript(&self, id: &SessionId) -> Option<String> {
        match self.inner.registry.get(id) {
            Some(context) => Some(context.transcript().await),
            None => None,
        }
    }

    /// Remove the context and close its stream, leaving any recovery claim
    pub(super) async fn detach(&self, id: &SessionId) -> Option<Arc<SessionContext>> {
        let context = self.inner.registry.remove(id)?;
        if let Err(e) = context.stream().close().await {
            warn!("Failed to close provider stream for {}: {}", id, e);
        }
        Some(context)
    }

    /// Consume one stream's events until the stream is finished or replaced
    ///
    /// Boxed because recovery reopens streams, which spawns this again.
    fn dispatch_events(
        self,
        id: SessionId,
        generation: u64,
        mut events: EventStream,
    ) -> BoxFuture<'static, ()> {
        async move {
            while let Some(event) = events.recv().await {
                match event {
                    ProviderEvent::Result(text) => self.on_result(&id, generation, &text).await,
                    ProviderEvent::IdleTimeout => {
                        self.silent_recovery(&id, generation).await;
                        break;
                    }
                    ProviderEvent::Error(cause) => {
                        self.full_recovery(&id, generation, cause).await;
                        break;
                    }
                    ProviderEvent::Completed => {
                        self.on_completed(&id, generation).await;
                        break;
                    }
                }
            }

            debug!("Event dispatch for session {} generation {} finished", id, generation);
        }
        .boxed()
    }

    async fn on_result(&self, id: &SessionId, generation: u64, text: &str) {
        match self.inner.registry.current(id, generation) {
            Some(context) => context.append(text).await,
            None => debug!("Ignoring result from superseded stream of session {}", id),
        }
    }

    async fn on_completed(&self, id: &SessionId, generation: u64) {
        let Some(context) = self.inner.registry.current(id, generation) else {
            debug!("Ignoring completion from superseded stream of session {}", id);
            return;
        };

        if !context.stop_requested() {
            warn!("Provider stream for session {} completed without a stop request", id);
            return;
        }

        self.finalize(id, generation).await;
    }

    /// Deliver the transcript and close the client connection, at most once
    pub(super) async fn finalize(&self, id: &SessionId, generation: u64) {
        // Removal before any I/O makes a second finalization a no-op
        let Some(context) = self.inner.registry.remove_generation(id, generation) else {
            return;
        };
        self.inner.registry.release_recovery(id);

        let transcript = context.transcript().await;
        self.deliver_transcript(id, &transcript).await;
    }

    pub(super) async fn deliver_transcript(&self, id: &SessionId, transcript: &str) {
        if !self.inner.clients.is_open(id) {
            info!("Session {} finished, client already gone", id);
            return;
        }

        info!(
            "Sending final transcript for session {} ({} chars)",
            id,
            transcript.chars().count()
        );
        self.notify(id, &ClientMessage::transcript(transcript)).await;
        self.close_client(id, CloseCode::Normal).await;
    }

    /// Send a message if the client is still connected; failures are logged
    pub(super) async fn notify(&self, id: &SessionId, message: &ClientMessage) {
        if !self.inner.clients.is_open(id) {
            return;
        }

        let payload = match message.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to encode message for {}: {}", id, e);
                return;
            }
        };

        if let Err(e) = self.inner.clients.send_text(id, payload).await {
            warn!("Failed to send message to {}: {}", id, e);
        }
    }

    pub(super) async fn close_client(&self, id: &SessionId, code: CloseCode) {
        if !self.inner.clients.is_open(id) {
            return;
        }

        if let Err(e) = self.inner.clients.close(id, code).await {
            warn!("Failed to close connection {}: {}", id, e);
        }
    }
}
