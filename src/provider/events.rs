use super::error::ProviderError;
use tokio::sync::mpsc;
use tracing::trace;

/// Output of one provider stream
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    /// A finalized recognition fragment (interim fragments are never emitted)
    Result(String),
    /// The stream hit the provider's duration or silence limit
    IdleTimeout,
    /// Any other stream-terminating fault
    Error(ProviderError),
    /// The stream drained after `close`
    Completed,
}

/// Receiving half of a stream's event channel
pub type EventStream = mpsc::UnboundedReceiver<ProviderEvent>;

/// Create the event channel for a single stream instance
pub fn event_channel() -> (EventSink, EventStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink { tx }, rx)
}

/// Sending half handed to a provider stream
///
/// Bound to exactly one stream: once the consumer drops the receiver,
/// events are discarded.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<ProviderEvent>,
}

impl EventSink {
    pub fn on_result(&self, text: impl Into<String>) {
        self.emit(ProviderEvent::Result(text.into()));
    }

    pub fn on_idle_timeout(&self) {
        self.emit(ProviderEvent::IdleTimeout);
    }

    pub fn on_error(&self, cause: ProviderError) {
        self.emit(ProviderEvent::Error(cause));
    }

    pub fn on_completed(&self) {
        self.emit(ProviderEvent::Completed);
    }

    /// Route a terminating failure to the idle-timeout or error event
    pub fn on_failure(&self, cause: ProviderError) {
        if cause.is_idle_timeout() {
            self.on_idle_timeout();
        } else {
            self.on_error(cause);
        }
    }

    fn emit(&self, event: ProviderEvent) {
        if let Err(mpsc::error::SendError(event)) = self.tx.send(event) {
            trace!("Dropping event for detached stream: {:?}", event);
        }
    }
}
