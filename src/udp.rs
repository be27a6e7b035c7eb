//! Datagram echo server and client
//!
//! No sessions and no registry: every datagram is answered on its own.
//! Payloads are bounded by `MAX_DATAGRAM_SIZE`; the client gives up on a
//! reply after `UDP_REPLY_TIMEOUT` since datagrams can be lost, and skips
//! replies that do not answer the line it just sent.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::message::QUIT_COMMAND;

/// Largest datagram payload sent or accepted
pub const MAX_DATAGRAM_SIZE: usize = 1024;

/// How long the client waits for each reply
pub const UDP_REPLY_TIMEOUT: Duration = Duration::from_secs(2);

/// Prefix on every echoed datagram
const ECHO_PREFIX: &str = "echo: ";

/// Build the reply for one datagram, truncated to fit a datagram
pub fn reply_for(payload: &[u8]) -> Vec<u8> {
    let text = String::from_utf8_lossy(payload);
    let mut reply = format!("{}{}", ECHO_PREFIX, text.trim_end()).into_bytes();
    reply.truncate(MAX_DATAGRAM_SIZE);
    reply
}

/// Answer datagrams until the socket fails
pub async fn serve(socket: UdpSocket) -> Result<(), AppError> {
    info!("UDP echo server listening on {}", socket.local_addr()?);
    let mut buf = [0u8; MAX_DATAGRAM_SIZE];

    loop {
        let (len, peer) = socket.recv_from(&mut buf).await?;
        debug!("Datagram of {} bytes from {}", len, peer);

        // A failed reply only affects that one peer
        if let Err(e) = socket.send_to(&reply_for(&buf[..len]), peer).await {
            warn!("Failed to answer {}: {}", peer, e);
        }
    }
}

/// Send each input line as one datagram and print the reply
///
/// Lines longer than a datagram are refused locally. A missing reply is
/// reported and the client carries on with the next line.
pub async fn run_client<I, O>(server: SocketAddr, input: I, output: O) -> Result<(), AppError>
where
    I: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let bind_addr = if server.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    let socket = UdpSocket::bind(bind_addr).await?;
    socket.connect(server).await?;

    let mut input = FramedRead::new(input, LinesCodec::new());
    let mut output = FramedWrite::new(output, LinesCodec::new());
    let mut buf = [0u8; MAX_DATAGRAM_SIZE];

    while let Some(line) = input.next().await {
        let line = line?;
        if line == QUIT_COMMAND {
            break;
        }
        if line.len() > MAX_DATAGRAM_SIZE {
            output
                .send(format!("! line longer than {} bytes not sent", MAX_DATAGRAM_SIZE))
                .await?;
            continue;
        }

        socket.send(line.as_bytes()).await?;

        // A reply that arrives after its timeout must not be taken as the
        // answer to a later line
        let expected = reply_for(line.as_bytes());
        let deadline = Instant::now() + UDP_REPLY_TIMEOUT;
        loop {
            match tokio::time::timeout_at(deadline, socket.recv(&mut buf)).await {
                Ok(Ok(len)) if buf[..len] == expected[..] => {
                    output
                        .send(String::from_utf8_lossy(&buf[..len]).into_owned())
                        .await?;
                    break;
                }
                Ok(Ok(len)) => debug!("Discarding stale reply of {} bytes", len),
                Ok(Err(e)) => {
                    // e.g. ICMP port unreachable surfaced on a connected socket
                    output.send(format!("! no reply: {}", e)).await?;
                    break;
                }
                Err(_) => {
                    output.send("! no reply (timed out)").await?;
                    break;
                }
            }
        }
    }

    Ok(())
}
