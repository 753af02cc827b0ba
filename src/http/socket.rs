use super::state::AppState;
use crate::session::SessionId;
use crate::transport::{ClientMessage, ClientSink, CloseCode, Outbound};
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Run one client connection from upgrade to close
///
/// Binary frames carry audio; a frame shorter than the configured stop
/// threshold asks for the final transcript. If the socket ends before the
/// server closed it, the session is torn down as an abnormal close.
pub async fn handle_socket(state: AppState, mut socket: WebSocket) {
    let id = SessionId::generate();
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();
    state.connections.register(id.clone(), tx);
    info!("Client connected: {}", id);

    if let Err(e) = state.manager.start(&id).await {
        error!("Failed to initialise transcription for {}: {:#}", id, e);
        send_init_failure(&state, &id).await;
    }

    let mut closed_by_server = false;

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                match outbound {
                    Some(Outbound::Text(text)) => {
                        if let Err(e) = socket.send(Message::Text(text)).await {
                            warn!("Failed to write to client {}: {}", id, e);
                            break;
                        }
                    }
                    Some(Outbound::Close(code)) => {
                        let frame = CloseFrame {
                            code: code.code(),
                            reason: "".into(),
                        };
                        if let Err(e) = socket.send(Message::Close(Some(frame))).await {
                            debug!("Close frame to {} not delivered: {}", id, e);
                        }
                        closed_by_server = true;
                        break;
                    }
                    None => break,
                }
            }
            inbound = socket.recv() => {
                let Some(Ok(message)) = inbound else {
                    break;
                };
                match message {
                    Message::Binary(data) => {
                        if state.session.is_stop_signal(data.len()) {
                            state.manager.request_stop(&id).await;
                        } else {
                            state.manager.route_audio(&id, data);
                        }
                    }
                    Message::Close(_) => break,
                    _ => continue,
                }
            }
        }
    }

    state.connections.unregister(&id);

    if closed_by_server {
        info!("Connection {} closed by server", id);
    } else {
        info!("Connection {} closed by client", id);
        state.manager.abnormal_close(&id).await;
    }
}

async fn send_init_failure(state: &AppState, id: &SessionId) {
    let connections = &state.connections;

    match ClientMessage::init_failed().to_json() {
        Ok(payload) => {
            if let Err(e) = connections.send_text(id, payload).await {
                warn!("Failed to notify {} of init failure: {}", id, e);
            }
        }
        Err(e) => error!("Failed to encode init failure: {}", e),
    }

    if let Err(e) = connections.close(id, CloseCode::ServerError).await {
        warn!("Failed to close connection {}: {}", id, e);
    }
}
