//! Client connection boundary
//!
//! The session manager talks to clients only through `ClientSink`. The
//! WebSocket server implements it with `ConnectionRegistry`; tests can
//! substitute a recording sink.

mod connections;
mod messages;

pub use connections::{ConnectionRegistry, Outbound};
pub use messages::{ClientMessage, ErrorCode, SessionStatus};

use crate::session::SessionId;
use anyhow::Result;
use async_trait::async_trait;

/// WebSocket close status used when the server ends a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    /// 1000
    Normal,
    /// 1011
    ServerError,
}

impl CloseCode {
    pub fn code(self) -> u16 {
        match self {
            Self::Normal => 1000,
            Self::ServerError => 1011,
        }
    }
}

/// Outbound side of the client connections
#[async_trait]
pub trait ClientSink: Send + Sync {
    /// Send one text frame
    async fn send_text(&self, id: &SessionId, payload: String) -> Result<()>;

    /// Close the connection with `code`
    async fn close(&self, id: &SessionId, code: CloseCode) -> Result<()>;

    fn is_open(&self, id: &SessionId) -> bool;
}
