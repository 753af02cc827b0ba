//! HTTP API server for transcription clients
//!
//! This module provides the WebSocket endpoint and a small REST surface:
//! - GET /ws/transcribe - Stream audio in, receive the final transcript
//! - GET /sessions - Count active and recovering sessions
//! - GET /health - Health check

mod handlers;
mod routes;
mod socket;
mod state;

pub use handlers::SessionsResponse;
pub use routes::create_router;
pub use state::AppState;
