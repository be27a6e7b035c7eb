//! Chat client
//!
//! The foreground loop forwards input lines to the server. Server lines are
//! rendered by a background reader task; the reader stops when the
//! foreground loop exits (cancellation token), and the foreground loop stops
//! when the reader sees the connection break.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MAX_LINE_LENGTH;
use crate::error::AppError;
use crate::message::{ServerMessage, QUIT_COMMAND};

/// How long to wait for the server's `BYE` after sending the quit token
const QUIT_GRACE: Duration = Duration::from_secs(1);

/// Connect to `addr` and run an interactive session
///
/// Returns when the user sends the quit token, input ends, or the
/// connection breaks.
pub async fn run<I, O>(addr: &str, input: I, output: O) -> Result<(), AppError>
where
    I: AsyncRead + Unpin,
    O: AsyncWrite + Unpin + Send + 'static,
{
    let stream = TcpStream::connect(addr).await?;
    info!("Connected to {}", addr);

    let (read_half, write_half) = stream.into_split();
    let server_lines = FramedRead::new(read_half, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
    let mut to_server = FramedWrite::new(write_half, LinesCodec::new());

    let cancel = CancellationToken::new();
    let mut reader = tokio::spawn(read_loop(
        server_lines,
        FramedWrite::new(output, LinesCodec::new()),
        cancel.clone(),
    ));

    let mut input = FramedRead::new(input, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
    let mut quit = false;

    let result = loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Connection gone, leaving send loop");
                break Ok(());
            }
            line = input.next() => line,
        };

        match line {
            Some(Ok(line)) => {
                if let Err(e) = to_server.send(&line).await {
                    break Err(AppError::from(e));
                }
                if line == QUIT_COMMAND {
                    quit = true;
                    break Ok(());
                }
            }
            Some(Err(e)) => break Err(AppError::from(e)),
            None => {
                // Input closed: leave politely
                quit = to_server.send(QUIT_COMMAND).await.is_ok();
                break Ok(());
            }
        }
    };

    let finished = quit && tokio::time::timeout(QUIT_GRACE, &mut reader).await.is_ok();
    cancel.cancel();
    if !finished {
        let _ = reader.await;
    }

    result
}

/// Render server lines until cancelled or the connection ends
pub async fn read_loop<R, W>(
    mut lines: FramedRead<R, LinesCodec>,
    mut out: FramedWrite<W, LinesCodec>,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut me: Option<String> = None;

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next() => line,
        };

        let text = match line {
            Some(Ok(line)) => match ServerMessage::parse(&line) {
                Some(msg) => {
                    if let ServerMessage::NameAccepted { name } = &msg {
                        me = Some(name.clone());
                    }
                    render(&msg, me.as_deref())
                }
                None => line,
            },
            Some(Err(e)) => {
                warn!("Bad line from server: {}", e);
                break;
            }
            None => {
                let _ = out.send("Connection closed by server").await;
                break;
            }
        };

        if out.send(text).await.is_err() {
            break;
        }
    }

    // Unblock the send loop if the connection went away first
    cancel.cancel();
}

/// Human-readable form of a server message
///
/// `me` is the accepted name, used to show private messages from the
/// local user's point of view.
pub fn render(msg: &ServerMessage, me: Option<&str>) -> String {
    match msg {
        ServerMessage::Welcome { banner } => format!("Connected to {}", banner),
        ServerMessage::SubmitName => "Enter your name:".to_string(),
        ServerMessage::NameAccepted { name } => format!(
            "Welcome, {}! Type @name to whisper, /users to list, {} to leave",
            name, QUIT_COMMAND
        ),
        ServerMessage::Chat { from, text } => format!("{}: {}", from, text),
        ServerMessage::Private { from, to, text } => {
            if me == Some(from.as_str()) {
                format!("[private] you -> {}: {}", to, text)
            } else if me == Some(to.as_str()) {
                format!("[private] {} -> you: {}", from, text)
            } else {
                format!("[private] {} -> {}: {}", from, to, text)
            }
        }
        ServerMessage::Notice { text } => format!("* {}", text),
        ServerMessage::Users { names } if names.is_empty() => "Online: nobody".to_string(),
        ServerMessage::Users { names } => format!("Online: {}", names.join(", ")),
        ServerMessage::Error { message } => format!("! {}", message),
        ServerMessage::Bye => "Goodbye.".to_string(),
    }
}
