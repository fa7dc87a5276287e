use std::{net::SocketAddr, sync::Arc};

use {
    axum::extract::ws::{Message, WebSocket},
    futures::{SinkExt, stream::StreamExt},
    tokio::sync::mpsc,
    tracing::{debug, info},
};

use crate::state::GatewayState;

/// Drive one observer connection: seed, push counts, clean up on close.
///
/// Observers are passive. Anything they send is read and discarded so that
/// close frames and dropped sockets are noticed.
pub async fn handle_connection(socket: WebSocket, state: Arc<GatewayState>, remote_addr: SocketAddr) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    info!(conn_id = %conn_id, remote_ip = %remote_addr.ip(), "ws: observer connected");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (client_tx, mut client_rx) = mpsc::unbounded_channel::<String>();

    let write_conn_id = conn_id.clone();
    let write_handle = tokio::spawn(async move {
        while let Some(frame) = client_rx.recv().await {
            if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                debug!(conn_id = %write_conn_id, "ws: write loop closed");
                break;
            }
        }
    });

    state.hub.connect(conn_id.clone(), client_tx);

    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Close(_)) => break,
            Ok(_) => {},
            Err(e) => {
                debug!(conn_id = %conn_id, error = %e, "ws: read error");
                break;
            },
        }
    }

    // Dropping the hub's sender ends the write loop.
    let connected_secs = state
        .hub
        .disconnect(&conn_id)
        .map(|observer| observer.connected_at.elapsed().as_secs());
    write_handle.abort();
    info!(
        conn_id = %conn_id,
        connected_secs = ?connected_secs,
        observers = state.hub.len(),
        "ws: observer disconnected"
    );
}
