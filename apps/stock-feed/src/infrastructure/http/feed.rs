//! WebSocket price feed.
//!
//! Each socket is one broadcast connection with a server-assigned id. The
//! client joins ticker groups with `{"type":"join","ticker":"ABC"}` and
//! receives `price_update` frames for every joined ticker.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::AppState;
use crate::domain::pricing::PriceUpdate;
use crate::domain::ticker::Ticker;
use crate::infrastructure::broadcast::{BroadcastChannel, ConnectionId};

/// Frame sent by a feed client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join the update group of a ticker.
    Join {
        /// Ticker to follow.
        ticker: String,
    },
}

/// Frame sent to a feed client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A join was accepted.
    Joined {
        /// Normalized ticker.
        ticker: Ticker,
    },
    /// New price for a joined ticker.
    PriceUpdate(PriceUpdate),
    /// A client frame was rejected.
    Error {
        /// Why.
        message: String,
    },
}

pub(super) async fn feed_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection = ConnectionId::new(Uuid::new_v4().to_string());
    let mut updates = state.broadcast.connect(connection.clone());
    let (mut sink, mut stream) = socket.split();

    info!(connection = %connection, "Feed client connected");

    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(update) = update else { break };
                if send(&mut sink, &ServerMessage::PriceUpdate(update)).await.is_err() {
                    break;
                }
            }
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let reply = handle_client_text(&state.broadcast, &connection, text.as_str());
                    if send(&mut sink, &reply).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                // Pings are answered by axum
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(connection = %connection, error = %e, "Feed socket error");
                    break;
                }
            },
        }
    }

    state.broadcast.disconnect(&connection);
    info!(connection = %connection, "Feed client disconnected");
}

async fn send(
    sink: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    match serde_json::to_string(message) {
        Ok(text) => sink.send(Message::Text(text.into())).await,
        Err(e) => {
            warn!(error = %e, "Failed to encode feed frame");
            Ok(())
        }
    }
}

/// Apply one client text frame and build the reply.
fn handle_client_text(
    broadcast: &BroadcastChannel,
    connection: &ConnectionId,
    text: &str,
) -> ServerMessage {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            return ServerMessage::Error {
                message: format!("malformed frame: {e}"),
            };
        }
    };

    match message {
        ClientMessage::Join { ticker } => {
            let ticker = match Ticker::parse(&ticker) {
                Ok(ticker) => ticker,
                Err(e) => {
                    return ServerMessage::Error {
                        message: format!("invalid ticker: {e}"),
                    };
                }
            };

            match broadcast.join(connection, &ticker) {
                Ok(()) => ServerMessage::Joined { ticker },
                Err(e) => ServerMessage::Error {
                    message: e.to_string(),
                },
            }
        }
    }
}
