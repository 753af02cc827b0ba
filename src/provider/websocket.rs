use super::config::StreamingConfig;
use super::error::ProviderError;
use super::events::EventSink;
use super::messages::{StreamingResponse, END_OF_STREAM};
use super::{ProviderStream, SpeechProvider};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type ProviderSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Speech provider reached through a JSON/WebSocket streaming endpoint
pub struct WebSocketProvider {
    url: String,
    streaming: StreamingConfig,
}

impl WebSocketProvider {
    pub fn new(url: impl Into<String>, streaming: StreamingConfig) -> Self {
        Self {
            url: url.into(),
            streaming,
        }
    }
}

#[async_trait]
impl SpeechProvider for WebSocketProvider {
    async fn open(&self, events: EventSink) -> Result<Box<dyn ProviderStream>> {
        debug!("Connecting to speech provider at {}", self.url);

        let (socket, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| ProviderError::Connect(e.to_string()))
            .with_context(|| format!("Failed to open stream to {}", self.url))?;

        let (mut write, read) = socket.split();

        let frame = self
            .streaming
            .to_frame()
            .context("Failed to encode streaming config")?;
        write
            .send(Message::Text(frame))
            .await
            .map_err(|e| ProviderError::Connect(e.to_string()))
            .context("Failed to send streaming config")?;

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_frames(write, outbound_rx));
        tokio::spawn(read_frames(read, events, writer));

        info!(
            "Speech stream opened ({}, {} Hz)",
            self.streaming.config.language_code, self.streaming.config.sample_rate_hertz
        );

        Ok(Box::new(WebSocketProviderStream { outbound }))
    }

    fn name(&self) -> &str {
        "websocket"
    }
}

#[derive(Debug)]
enum Outbound {
    Audio(Vec<u8>),
    EndOfStream,
}

struct WebSocketProviderStream {
    outbound: mpsc::UnboundedSender<Outbound>,
}

#[async_trait]
impl ProviderStream for WebSocketProviderStream {
    fn send_audio(&self, audio: Vec<u8>) -> Result<()> {
        self.outbound
            .send(Outbound::Audio(audio))
            .map_err(|_| anyhow!("speech stream writer has stopped"))
    }

    async fn close(&self) -> Result<()> {
        // Writer already gone means the stream is already finished
        if self.outbound.send(Outbound::EndOfStream).is_err() {
            debug!("Speech stream already closed");
        }
        Ok(())
    }
}

async fn write_frames(
    mut write: SplitSink<ProviderSocket, Message>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) {
    while let Some(frame) = outbound.recv().await {
        let (message, last) = match frame {
            Outbound::Audio(audio) => (Message::Binary(audio), false),
            Outbound::EndOfStream => (Message::Text(END_OF_STREAM.to_string()), true),
        };

        if let Err(e) = write.send(message).await {
            warn!("Failed to write to speech stream: {}", e);
            break;
        }

        if last {
            debug!("End of audio sent to speech provider");
            break;
        }
    }
}

async fn read_frames(
    mut read: SplitStream<ProviderSocket>,
    events: EventSink,
    writer: JoinHandle<()>,
) {
    while let Some(message) = read.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                writer.abort();
                events.on_failure(ProviderError::Transport(e.to_string()));
                return;
            }
        };

        let response = match serde_json::from_str::<StreamingResponse>(&text) {
            Ok(response) => response,
            Err(e) => {
                writer.abort();
                events.on_failure(ProviderError::Protocol(e.to_string()));
                return;
            }
        };

        if response.has_interim() {
            debug!("Interim result received");
        }

        for transcript in response.final_transcripts() {
            events.on_result(transcript);
        }

        if let Some(err) = response.into_error() {
            writer.abort();
            events.on_failure(err);
            return;
        }
    }

    writer.abort();
    events.on_completed();
}
