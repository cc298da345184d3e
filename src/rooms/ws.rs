use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::events::{ConnId, ServerEvent};
use super::hub::Hub;
use crate::AppState;

#[debug_handler(state = AppState)]
pub async fn room_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_socket(state, socket))
}

/// Runs the disconnect transition when the connection's task ends, however it ends.
struct Teardown {
    hub: Arc<Hub>,
    conn: ConnId,
}

impl Drop for Teardown {
    fn drop(&mut self) {
        let outcome = self.hub.disconnect(self.conn);
        self.hub.deliver(outcome.deliveries);
    }
}

async fn serve_socket(state: AppState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbox, mut inbox) = mpsc::unbounded_channel::<ServerEvent>();
    let conn = state.hub.connect(outbox);
    let _teardown = Teardown {
        hub: state.hub.clone(),
        conn,
    };
    info!(%conn, connections = state.hub.registry().len(), "websocket connected");

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = inbox.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(err) => {
                    warn!(%conn, %err, "could not encode outbound event");
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => handle_text(&state, conn, text.as_str()),
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // The reader must be finished before teardown runs, or a frame still being handled could
    // put the connection back into a room after it has been swept.
    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
            let _ = recv_task.await;
        }
        _ = &mut recv_task => send_task.abort(),
    };
}

fn handle_text(state: &AppState, conn: ConnId, frame: &str) {
    let outcome = state.hub.handle_frame(conn, frame);
    state.hub.deliver(outcome.deliveries);
    if state.config.persist_events {
        state.effects.push(outcome.effects);
    }
}
