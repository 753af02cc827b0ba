use super::socket::handle_socket;
use super::state::AppState;
use axum::{
    extract::{State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionsResponse {
    /// Sessions with a live provider stream
    pub active: usize,

    /// Sessions currently reconnecting
    pub recovering: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /ws/transcribe
/// Upgrade to a transcription WebSocket
pub async fn transcribe_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.max_message_size(state.session.max_message_bytes)
        .on_upgrade(move |socket| handle_socket(state, socket))
}

/// GET /sessions
/// Count of active and recovering sessions
pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    let registry = state.manager.registry();

    (
        StatusCode::OK,
        Json(SessionsResponse {
            active: registry.active_count(),
            recovering: registry.recovering_count(),
        }),
    )
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
