//! `WebSocket` session lifecycle: handles a single connected client from
//! upgrade through disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::histogram;
use presence_core::SessionId;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::ClientConnection;
use crate::metrics::CONNECTION_DURATION_SECONDS;
use crate::relay::Relay;

/// How long the writer task gets to flush after the reader stops.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Run a `WebSocket` session for a connected client.
///
/// 1. Registers the client with the relay, which queues `init` and announces `join`
/// 2. Applies incoming text (or UTF-8 binary) frames as client messages
/// 3. Forwards queued outbound frames in order from a writer task
/// 4. Stops when the peer closes, the relay evicts it, or the server shuts down
/// 5. Removes the session and announces `leave` unless it was already evicted
#[instrument(skip_all, fields(session_id = %id))]
pub async fn run_ws_session(
    ws: WebSocket,
    id: SessionId,
    relay: Arc<Relay>,
    send_queue: usize,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(send_queue);
    let connection = Arc::new(ClientConnection::new(id.clone(), send_tx));
    let closed = connection.close_token();

    let outbound_closed = closed.clone();
    let mut outbound = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                () = outbound_closed.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
                msg = send_rx.recv() => {
                    let Some(text) = msg else { break };
                    if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    info!("client connected");
    let _ = relay.accept(Arc::clone(&connection));

    loop {
        let frame = tokio::select! {
            () = closed.cancelled() => {
                debug!("connection closed by relay");
                break;
            }
            () = shutdown.cancelled() => {
                debug!("server shutting down");
                break;
            }
            frame = ws_rx.next() => frame,
        };

        match frame {
            Some(Ok(Message::Text(text))) => {
                let _ = relay.ingest_text(&id, text.as_str());
            }
            Some(Ok(Message::Binary(data))) => {
                let _ = relay.ingest_binary(&id, &data);
            }
            Some(Ok(Message::Close(_))) => {
                info!("client sent close frame");
                break;
            }
            // Control frames are answered by the transport and are not liveness.
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
            Some(Err(e)) => {
                warn!(error = %e, "websocket receive error");
                break;
            }
            None => break,
        }
    }

    let _ = relay.disconnect(&id);
    connection.close();

    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut outbound).await.is_err() {
        outbound.abort();
    }

    histogram!(CONNECTION_DURATION_SECONDS).record(connection.age().as_secs_f64());
    info!(dropped = connection.drop_count(), "client disconnected");
}
