//! Socket endpoint.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, error};

use super::Shared;
use crate::error::TransportError;
use crate::protocol::{Frame, WireFormat};

#[derive(Debug, Default, Deserialize)]
pub(super) struct SocketParams {
    session: Option<String>,
    format: Option<WireFormat>,
}

pub(super) async fn upgrade(
    State(shared): State<Arc<Shared>>,
    Query(params): Query<SocketParams>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(shared, socket, params))
}

async fn handle_socket(shared: Arc<Shared>, socket: WebSocket, params: SocketParams) {
    let format = params.format.unwrap_or_default();
    let (conn, mut outbound) = shared.manager.connect(params.session, format);
    let id = conn.id();
    let (mut ws_sender, ws_receiver) = socket.split();

    // Single writer: frames leave in the order they were queued.
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let frame = match format.encode(&message) {
                Ok(frame) => frame,
                Err(err) => {
                    error!(connection = %id, error = %err, "failed to encode message");
                    continue;
                }
            };
            let ws_message = match frame {
                Frame::Text(text) => Message::Text(text.into()),
                Frame::Binary(bytes) => Message::Binary(bytes.into()),
            };
            if ws_sender.send(ws_message).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    let inbound = ws_receiver.filter_map(|message| async move {
        match message {
            Ok(Message::Text(text)) => Some(Ok(Frame::Text(text.as_str().to_owned()))),
            Ok(Message::Binary(bytes)) => Some(Ok(Frame::Binary(bytes.to_vec()))),
            Ok(Message::Close(_)) => Some(Err(TransportError::Closed)),
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => None,
            Err(err) => Some(Err(TransportError::Socket(err.to_string()))),
        }
    });

    // Dropping the last connection handle ends the writer once the queue drains.
    shared.manager.serve(conn, Box::pin(inbound)).await;
    if let Err(err) = writer.await {
        debug!(connection = %id, error = %err, "writer task ended abnormally");
    }
}
