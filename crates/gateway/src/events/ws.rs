//! `/ws` — the streaming channel. Full-duplex text frames; the server
//! pushes Events, the client may push `{"type":"ping"}`.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use chrono::Utc;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};

use dp_domain::event::{ClientMessage, Event, ServerAck};

use crate::state::ApiState;

pub async fn event_stream(ws: WebSocketUpgrade, State(state): State<ApiState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: ApiState) {
    let (ws_sink, mut ws_stream) = socket.split();
    let client_id = uuid::Uuid::new_v4().to_string();

    let bus_rx = state.app.events.subscribe();
    let (outbound_tx, outbound_rx) = mpsc::channel::<Value>(64);

    let writer = tokio::spawn(forward_to_socket(ws_sink, bus_rx, outbound_rx));

    let connection = Event::Connection {
        connected: true,
        client_id: client_id.clone(),
        server_time: Utc::now(),
    };
    if outbound_tx
        .send(serde_json::to_value(&connection).expect("Event always serializes"))
        .await
        .is_err()
    {
        writer.abort();
        return;
    }

    tracing::info!(client_id = %client_id, "client connected");

    while let Some(Ok(msg)) = ws_stream.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Ping) => {
                    let ack = serde_json::to_value(&ServerAck::Pong).expect("ServerAck always serializes");
                    if outbound_tx.send(ack).await.is_err() {
                        break;
                    }
                }
                Ok(ClientMessage::Subscribe) | Ok(ClientMessage::Unsubscribe) => {
                    // Reserved; accepted and ignored.
                }
                Err(_) => {
                    tracing::debug!(client_id = %client_id, "dropping malformed inbound message");
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    writer.abort();
    tracing::info!(client_id = %client_id, "client disconnected");
}

/// Drains both the Event Bus broadcast and this client's direct-reply
/// channel (connection/pong acks) into the socket, in the order received.
async fn forward_to_socket(
    mut sink: SplitSink<WebSocket, Message>,
    mut bus_rx: broadcast::Receiver<Event>,
    mut outbound_rx: mpsc::Receiver<Value>,
) {
    loop {
        tokio::select! {
            event = bus_rx.recv() => {
                match event {
                    Ok(ev) => {
                        if send_json(&mut sink, &ev).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "subscriber lagged behind event bus, dropping events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            frame = outbound_rx.recv() => {
                match frame {
                    Some(value) => {
                        if send_json(&mut sink, &value).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }
}

async fn send_json(sink: &mut SplitSink<WebSocket, Message>, value: &impl serde::Serialize) -> Result<(), ()> {
    let json = serde_json::to_string(value).map_err(|_| ())?;
    sink.send(Message::Text(json)).await.map_err(|_| ())
}
