//! WebSocket upgrade handler for spectators

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::util::rate_limit::SpectatorRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, MatchStatus, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let spectator_id = Uuid::new_v4();
    info!(spectator_id = %spectator_id, "WebSocket upgrade for spectator");
    ws.on_upgrade(move |socket| handle_socket(socket, spectator_id, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, spectator_id: Uuid, state: AppState) {
    let (mut ws_sink, ws_stream) = socket.split();

    // Subscribe before reading the panels so no overwrite slips between them
    let feed_rx = state.board.subscribe();
    let mut status_rx = state.status_rx.clone();
    status_rx.borrow_and_update();

    let welcome = welcome_message(&state);
    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(spectator_id = %spectator_id, error = %e, "Failed to send welcome");
        return;
    }

    run_session(spectator_id, ws_sink, ws_stream, feed_rx, status_rx).await;

    info!(spectator_id = %spectator_id, "WebSocket connection closed");
}

/// Current panels and status for a freshly connected spectator
fn welcome_message(state: &AppState) -> ServerMsg {
    ServerMsg::Welcome {
        server_time: unix_millis(),
        message: state.board.message_text(),
        score: state.board.score_text(),
        status: state.status_rx.borrow().clone(),
    }
}

/// Run the WebSocket session with read/write split
async fn run_session(
    spectator_id: Uuid,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    mut feed_rx: broadcast::Receiver<ServerMsg>,
    mut status_rx: watch::Receiver<Option<MatchStatus>>,
) {
    let rate_limiter = SpectatorRateLimiter::new();
    let (reply_tx, mut reply_rx) = mpsc::channel::<ServerMsg>(16);

    // Writer task: panel feed, status changes and replies -> WebSocket
    let writer_handle = tokio::spawn(async move {
        let mut status_open = true;
        loop {
            let msg = tokio::select! {
                feed = feed_rx.recv() => match feed {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(
                            spectator_id = %spectator_id,
                            lagged_count = n,
                            "Spectator lagged, skipping {} panel updates", n
                        );
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(spectator_id = %spectator_id, "Panel feed closed");
                        break;
                    }
                },
                changed = status_rx.changed(), if status_open => {
                    if changed.is_err() {
                        status_open = false;
                        continue;
                    }
                    match status_rx.borrow_and_update().clone() {
                        Some(status) => ServerMsg::Status { status },
                        None => continue,
                    }
                }
                reply = reply_rx.recv() => match reply {
                    Some(msg) => msg,
                    None => break,
                },
            };

            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(spectator_id = %spectator_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> replies
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_message() {
                    warn!(spectator_id = %spectator_id, "Rate limited spectator message");
                    continue;
                }

                let reply = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(client_msg) => handle_client_msg(client_msg),
                    Err(e) => {
                        warn!(spectator_id = %spectator_id, error = %e, "Failed to parse client message");
                        ServerMsg::Error {
                            code: "bad_message".to_string(),
                            message: e.to_string(),
                        }
                    }
                };

                if reply_tx.send(reply).await.is_err() {
                    debug!(spectator_id = %spectator_id, "Writer gone");
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(spectator_id = %spectator_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(spectator_id = %spectator_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(spectator_id = %spectator_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(spectator_id = %spectator_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(spectator_id = %spectator_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Reply to a single spectator message
fn handle_client_msg(msg: ClientMsg) -> ServerMsg {
    match msg {
        ClientMsg::Ping { t } => ServerMsg::Pong { t },
    }
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::game::display::TextSink;
    use tokio_test::assert_ok;

    #[test]
    fn ping_is_echoed() {
        assert!(matches!(handle_client_msg(ClientMsg::Ping { t: 7 }), ServerMsg::Pong { t: 7 }));
    }

    #[test]
    fn welcome_carries_current_panels() {
        let state = AppState::new(assert_ok!(Config::from_lookup(|_| None)));
        state.board.score_panel().set_text("ROUND: 2\n".to_string());

        match welcome_message(&state) {
            ServerMsg::Welcome {
                message,
                score,
                status,
                ..
            } => {
                assert!(message.is_empty());
                assert_eq!(score, "ROUND: 2\n");
                assert!(status.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
