//! Task-per-connection session handler
//!
//! Handles individual client connections: line framing, feeding the
//! session state machine, and a writer task that owns the socket's write
//! half so lines to one client go out in the order they were queued.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, info, warn};

use crate::config::MAX_LINE_LENGTH;
use crate::error::AppError;
use crate::message::ServerMessage;
use crate::router::Router;
use crate::session::{Flow, Session};
use crate::sink::ChannelSink;
use crate::types::ClientId;

/// How long a closing connection may take to flush its queued lines
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle one accepted TCP connection until it closes
///
/// Cleanup (name release, departure notice, socket close) runs whether the
/// client quit, vanished, or sent something unreadable.
pub async fn handle_connection(
    stream: TcpStream,
    router: Router<ChannelSink>,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    let client_id = ClientId::new();
    info!("Client {} connected from {}", client_id, peer_addr);

    let (read_half, write_half) = stream.into_split();
    let mut lines = FramedRead::new(read_half, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

    // Channel for server -> client lines, drained by the writer task
    let (sink, msg_rx) = ChannelSink::channel();
    let mut write_task = tokio::spawn(write_loop(client_id, write_half, msg_rx));

    let mut session = Session::new(client_id, sink, router);
    session.start();

    let result = loop {
        tokio::select! {
            line = lines.next() => match line {
                Some(Ok(line)) => {
                    if session.handle_line(&line) == Flow::Close {
                        break Ok(());
                    }
                }
                Some(Err(e)) => {
                    warn!("Read error for {}: {}", client_id, e);
                    break Err(AppError::from(e));
                }
                None => {
                    debug!("Client {} reached end of stream", client_id);
                    break Ok(());
                }
            },
            _ = &mut write_task => {
                debug!("Write task ended early for {}", client_id);
                break Ok(());
            }
        }
    };

    session.close();
    // Dropping the session drops its sink; the writer ends once the queue
    // drains and no broadcast snapshot still holds a clone.
    drop(session);

    if !write_task.is_finished()
        && tokio::time::timeout(DRAIN_TIMEOUT, &mut write_task)
            .await
            .is_err()
    {
        debug!("Writer for {} did not drain in time", client_id);
        write_task.abort();
    }

    info!("Client {} disconnected", client_id);
    result
}

/// Drain queued messages into the socket, then shut the write side down
async fn write_loop(
    client_id: ClientId,
    write_half: OwnedWriteHalf,
    mut msg_rx: mpsc::UnboundedReceiver<ServerMessage>,
) {
    let mut writer = FramedWrite::new(write_half, LinesCodec::new());

    while let Some(msg) = msg_rx.recv().await {
        if let Err(e) = writer.send(msg.to_string()).await {
            debug!("Send to {} failed, ending write task: {}", client_id, e);
            return;
        }
    }

    debug!("Write task ended for {}", client_id);
    let _ = SinkExt::<String>::close(&mut writer).await;
}
