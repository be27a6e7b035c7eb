//! Line echo server and client over TCP
//!
//! The simplest variant: no names, no registry. Each connection gets its own
//! task and every line is answered with `echo: <line>`.

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, error, info, warn};

use crate::config::MAX_LINE_LENGTH;
use crate::error::AppError;
use crate::message::QUIT_COMMAND;

/// Prefix on every echoed line
pub const ECHO_PREFIX: &str = "echo: ";

/// Reply for one received line
pub fn echo_reply(line: &str) -> String {
    format!("{}{}", ECHO_PREFIX, line)
}

/// Accept connections forever, echoing lines on each
pub async fn serve(listener: TcpListener) {
    if let Ok(addr) = listener.local_addr() {
        info!("Echo server listening on {}", addr);
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!("Echo connection from {}", addr);
                tokio::spawn(async move {
                    if let Err(e) = echo_connection(stream).await {
                        warn!("Echo connection {} failed: {}", addr, e);
                    }
                    debug!("Echo connection {} closed", addr);
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// Echo every line until the peer closes or sends the quit token
pub async fn echo_connection(stream: TcpStream) -> Result<(), AppError> {
    let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

    while let Some(line) = framed.next().await {
        let line = line?;
        framed.send(echo_reply(&line)).await?;
        if line == QUIT_COMMAND {
            break;
        }
    }

    Ok(())
}

/// Send each input line to the echo server and print each reply
pub async fn run_client<I, O>(addr: &str, input: I, output: O) -> Result<(), AppError>
where
    I: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let stream = TcpStream::connect(addr).await?;
    let mut server = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
    let mut input = FramedRead::new(input, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
    let mut output = FramedWrite::new(output, LinesCodec::new());

    while let Some(line) = input.next().await {
        let line = line?;
        server.send(&line).await?;

        match server.next().await {
            Some(reply) => output.send(reply?).await?,
            None => {
                output.send("Connection closed by server").await?;
                break;
            }
        }

        if line == QUIT_COMMAND {
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_reply() {
        assert_eq!(echo_reply("hi there"), "echo: hi there");
    }

    #[tokio::test]
    async fn test_echo_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener));

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut framed = Framed::new(stream, LinesCodec::new());

        framed.send("ping").await.unwrap();
        assert_eq!(framed.next().await.unwrap().unwrap(), "echo: ping");

        framed.send(QUIT_COMMAND).await.unwrap();
        assert_eq!(
            framed.next().await.unwrap().unwrap(),
            echo_reply(QUIT_COMMAND)
        );
        assert!(framed.next().await.is_none());
    }

    #[tokio::test]
    async fn test_client_prints_replies() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(serve(listener));

        let input: &[u8] = b"one\ntwo\n";
        let mut output = Vec::new();
        run_client(&addr, input, &mut output).await.unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), "echo: one\necho: two\n");
    }
}
