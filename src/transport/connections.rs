use super::{ClientSink, CloseCode};
use crate::session::SessionId;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;

/// Frame queued for a client socket task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Close(CloseCode),
}

/// Open client sockets (session_id → outbound queue)
///
/// A connection counts as open from `register` until the server closes it
/// or the socket task calls `unregister`.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<SessionId, mpsc::UnboundedSender<Outbound>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: SessionId, tx: mpsc::UnboundedSender<Outbound>) {
        self.connections.insert(id, tx);
    }

    pub fn unregister(&self, id: &SessionId) {
        self.connections.remove(id);
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[async_trait]
impl ClientSink for ConnectionRegistry {
    async fn send_text(&self, id: &SessionId, payload: String) -> Result<()> {
        let tx = self
            .connections
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| anyhow!("connection {} is not open", id))?;

        tx.send(Outbound::Text(payload))
            .map_err(|_| anyhow!("connection {} is shutting down", id))
    }

    async fn close(&self, id: &SessionId, code: CloseCode) -> Result<()> {
        // Closed from now on, even before the socket task sends the frame
        let (_, tx) = self
            .connections
            .remove(id)
            .ok_or_else(|| anyhow!("connection {} is not open", id))?;

        tx.send(Outbound::Close(code))
            .map_err(|_| anyhow!("connection {} is shutting down", id))
    }

    fn is_open(&self, id: &SessionId) -> bool {
        self.connections.contains_key(id)
    }
}
