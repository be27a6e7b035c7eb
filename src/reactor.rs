//! Single-threaded reactor server
//!
//! The same registry, router and session state machine as the threaded
//! server, driven by one `mio` event loop instead of a task per connection.
//!
//! Each connection record keeps a decode buffer, a pending-output buffer and
//! its current interest. Readable connections are read until `WouldBlock`
//! and their complete lines fed to the session; anything the sessions queue
//! is appended to the target's pending output and that connection is flipped
//! to writable. Writable connections are flushed as far as the socket
//! allows, then flipped back to readable once empty.
//!
//! Nothing inside the loop may block: no DNS, no disk, no synchronous
//! connect. The listening address is resolved before the loop starts.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::{mpsc, Arc};

use bytes::{Buf, BytesMut};
use mio::event::Event;
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use tokio_util::codec::{Decoder, Encoder, LinesCodec};
use tracing::{debug, error, info, warn};

use crate::config::MAX_LINE_LENGTH;
use crate::error::SendError;
use crate::message::ServerMessage;
use crate::registry::Registry;
use crate::router::Router;
use crate::session::{Flow, Session};
use crate::sink::Sink;
use crate::types::ClientId;

const SERVER: Token = Token(0);
const EVENTS_CAPACITY: usize = 256;
const READ_CHUNK: usize = 4096;

/// Sink for a reactor connection
///
/// Messages are queued on the loop's dispatch channel tagged with the
/// target token; the loop moves them into that connection's pending output
/// after the current event.
#[derive(Debug, Clone)]
pub struct ReactorSink {
    token: Token,
    dispatch: mpsc::Sender<(Token, ServerMessage)>,
}

impl Sink for ReactorSink {
    fn deliver(&self, msg: &ServerMessage) -> Result<(), SendError> {
        self.dispatch
            .send((self.token, msg.clone()))
            .map_err(|_| SendError::ChannelClosed)
    }
}

/// Per-connection record
struct Connection {
    stream: TcpStream,
    session: Session<ReactorSink>,
    codec: LinesCodec,
    inbound: BytesMut,
    outbound: BytesMut,
    interest: Interest,
    /// Session is over; close once pending output is flushed
    closing: bool,
}

/// What a readable event did to a connection
enum ReadOutcome {
    Open,
    /// Session asked to close (quit) or the peer finished sending
    Finished,
    /// Unrecoverable read or framing error
    Failed,
}

/// The single-threaded chat server
pub struct Reactor {
    poll: Poll,
    listener: TcpListener,
    connections: HashMap<Token, Connection>,
    next_token: usize,
    router: Router<ReactorSink>,
    dispatch_tx: mpsc::Sender<(Token, ServerMessage)>,
    dispatch_rx: mpsc::Receiver<(Token, ServerMessage)>,
}

impl Reactor {
    /// Resolve `addr`, bind, and register the listener
    pub fn bind(addr: &str) -> io::Result<Self> {
        let addr: SocketAddr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no address resolved"))?;

        let poll = Poll::new()?;
        let mut listener = TcpListener::bind(addr)?;
        poll.registry()
            .register(&mut listener, SERVER, Interest::READABLE)?;

        let (dispatch_tx, dispatch_rx) = mpsc::channel();

        Ok(Self {
            poll,
            listener,
            connections: HashMap::new(),
            next_token: SERVER.0 + 1,
            router: Router::new(Arc::new(Registry::new())),
            dispatch_tx,
            dispatch_rx,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn router(&self) -> &Router<ReactorSink> {
        &self.router
    }

    /// Run the event loop until the process is terminated or polling fails
    pub fn run(&mut self) -> io::Result<()> {
        info!("Reactor accepting on {}", self.local_addr()?);
        let mut events = Events::with_capacity(EVENTS_CAPACITY);

        loop {
            if let Err(e) = self.poll.poll(&mut events, None) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(e);
            }

            for event in events.iter() {
                match event.token() {
                    SERVER => self.accept_all(),
                    token => self.connection_event(token, event),
                }
                self.dispatch();
            }
        }
    }

    fn accept_all(&mut self) {
        loop {
            let (mut stream, addr) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    return;
                }
            };

            let token = Token(self.next_token);
            self.next_token += 1;

            if let Err(e) = self
                .poll
                .registry()
                .register(&mut stream, token, Interest::READABLE)
            {
                error!("Failed to register connection from {}: {}", addr, e);
                continue;
            }

            let sink = ReactorSink {
                token,
                dispatch: self.dispatch_tx.clone(),
            };
            let session = Session::new(ClientId::new(), sink, self.router.clone());
            info!("Client {} connected from {}", session.id(), addr);
            session.start();

            self.connections.insert(
                token,
                Connection {
                    stream,
                    session,
                    codec: LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
                    inbound: BytesMut::with_capacity(READ_CHUNK),
                    outbound: BytesMut::new(),
                    interest: Interest::READABLE,
                    closing: false,
                },
            );
        }
    }

    fn connection_event(&mut self, token: Token, event: &Event) {
        let Some(conn) = self.connections.get_mut(&token) else {
            return;
        };

        if event.is_readable() && !conn.closing {
            match read_lines(conn) {
                ReadOutcome::Open => {}
                ReadOutcome::Finished => self.finish(token),
                ReadOutcome::Failed => {
                    self.remove(token);
                    return;
                }
            }
        }

        // Pick up the session's replies before deciding whether to flush
        self.dispatch();

        let Some(conn) = self.connections.get_mut(&token) else {
            return;
        };
        if event.is_writable() || conn.closing {
            self.flush(token);
        }
    }

    /// End the session; keep the socket only until pending output is out
    fn finish(&mut self, token: Token) {
        let Some(conn) = self.connections.get_mut(&token) else {
            return;
        };
        conn.session.close();
        conn.closing = true;
    }

    /// Write as much pending output as the socket takes
    fn flush(&mut self, token: Token) {
        let Some(conn) = self.connections.get_mut(&token) else {
            return;
        };

        while !conn.outbound.is_empty() {
            match conn.stream.write(&conn.outbound) {
                Ok(0) => {
                    self.remove(token);
                    return;
                }
                Ok(n) => conn.outbound.advance(n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("Write to {} failed: {}", conn.session.id(), e);
                    self.remove(token);
                    return;
                }
            }
        }

        if conn.outbound.is_empty() {
            if conn.closing {
                self.remove(token);
            } else {
                self.set_interest(token, Interest::READABLE);
            }
        }
    }

    /// Move queued messages into their connections' pending output
    fn dispatch(&mut self) {
        while let Ok((token, msg)) = self.dispatch_rx.try_recv() {
            let Some(conn) = self.connections.get_mut(&token) else {
                debug!("Dropping message for closed connection {:?}", token);
                continue;
            };

            if let Err(e) = conn.codec.encode(msg.to_string(), &mut conn.outbound) {
                warn!("Failed to encode message for {}: {}", conn.session.id(), e);
                continue;
            }
            self.set_interest(token, Interest::WRITABLE);
        }
    }

    fn set_interest(&mut self, token: Token, interest: Interest) {
        let Some(conn) = self.connections.get_mut(&token) else {
            return;
        };
        if conn.interest == interest {
            return;
        }

        let result = self
            .poll
            .registry()
            .reregister(&mut conn.stream, token, interest);
        match result {
            Ok(()) => conn.interest = interest,
            Err(e) => {
                warn!("Failed to change interest for {}: {}", conn.session.id(), e);
                self.remove(token);
            }
        }
    }

    /// Drop the connection record; closes the socket
    fn remove(&mut self, token: Token) {
        let Some(mut conn) = self.connections.remove(&token) else {
            return;
        };
        conn.session.close();
        if let Err(e) = self.poll.registry().deregister(&mut conn.stream) {
            debug!("Deregister failed for {}: {}", conn.session.id(), e);
        }
        info!("Client {} disconnected", conn.session.id());
    }
}

/// Read until the socket would block and feed every complete line to the
/// session
fn read_lines(conn: &mut Connection) -> ReadOutcome {
    let mut chunk = [0u8; READ_CHUNK];
    let mut eof = false;

    loop {
        match conn.stream.read(&mut chunk) {
            Ok(0) => {
                eof = true;
                break;
            }
            Ok(n) => conn.inbound.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!("Read from {} failed: {}", conn.session.id(), e);
                return ReadOutcome::Failed;
            }
        }
    }

    loop {
        let decoded = if eof {
            conn.codec.decode_eof(&mut conn.inbound)
        } else {
            conn.codec.decode(&mut conn.inbound)
        };

        match decoded {
            Ok(Some(line)) => {
                if conn.session.handle_line(&line) == Flow::Close {
                    return ReadOutcome::Finished;
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Framing error from {}: {}", conn.session.id(), e);
                return ReadOutcome::Failed;
            }
        }
    }

    if eof {
        debug!("Client {} reached end of stream", conn.session.id());
        ReadOutcome::Finished
    } else {
        ReadOutcome::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reactor_sink_tags_messages() {
        let (tx, rx) = mpsc::channel();
        let sink = ReactorSink {
            token: Token(7),
            dispatch: tx,
        };

        sink.deliver(&ServerMessage::SubmitName).unwrap();

        assert_eq!(rx.try_recv().unwrap(), (Token(7), ServerMessage::SubmitName));
    }

    #[test]
    fn test_reactor_sink_closed_loop() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let sink = ReactorSink {
            token: Token(1),
            dispatch: tx,
        };

        assert_eq!(
            sink.deliver(&ServerMessage::Bye),
            Err(SendError::ChannelClosed)
        );
    }

    #[test]
    fn test_bind_ephemeral() {
        let reactor = Reactor::bind("127.0.0.1:0").unwrap();
        assert_ne!(reactor.local_addr().unwrap().port(), 0);
        assert!(reactor.router().registry().is_empty());
    }
}
