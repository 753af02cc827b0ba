pub mod config;
pub mod http;
pub mod provider;
pub mod session;
pub mod transport;

pub use config::Config;
pub use http::{create_router, AppState};
pub use provider::{
    EventSink, ProviderError, ProviderEvent, ProviderStream, SpeechProvider, StreamingConfig,
    TranscodeConfig, TranscodingProvider, WebSocketProvider,
};
pub use session::{SessionConfig, SessionId, TranscriptionManager};
pub use transport::{ClientMessage, ClientSink, CloseCode, ConnectionRegistry};
