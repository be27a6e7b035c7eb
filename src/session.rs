//! Per-connection session state machine
//!
//! Transport-free: the driver (task-per-connection handler or the reactor)
//! feeds it decoded lines and acts on the returned [`Flow`]. All output goes
//! through the session's own sink or the router.
//!
//! ```text
//! AwaitingName ──name accepted──▶ Active ──/quit, EOF, read error──▶ Closed
//!      │                                                              ▲
//!      └──────────────────────── EOF, read error ─────────────────────┘
//! ```

use tracing::{debug, info};

use crate::error::AppError;
use crate::message::{ClientMessage, ServerMessage};
use crate::router::Router;
use crate::sink::Sink;
use crate::types::{ClientId, DisplayName};

/// Banner carried by the `WELCOME` line
pub const WELCOME_BANNER: &str = "line chat server";

/// Session lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, no name claimed yet
    AwaitingName,
    /// Registered under a unique name
    Active(DisplayName),
    /// Torn down; terminal
    Closed,
}

/// What the driver should do after a line has been handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Stop reading and call [`Session::close`]
    Close,
}

/// One client connection's protocol state
#[derive(Debug)]
pub struct Session<S> {
    id: ClientId,
    sink: S,
    router: Router<S>,
    state: SessionState,
}

impl<S: Sink> Session<S> {
    pub fn new(id: ClientId, sink: S, router: Router<S>) -> Self {
        Self {
            id,
            sink,
            router,
            state: SessionState::AwaitingName,
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Registered name, once active
    pub fn name(&self) -> Option<&DisplayName> {
        match &self.state {
            SessionState::Active(name) => Some(name),
            _ => None,
        }
    }

    /// Greet the client and ask for a name
    pub fn start(&self) {
        self.reply(&ServerMessage::Welcome {
            banner: WELCOME_BANNER.to_string(),
        });
        self.reply(&ServerMessage::SubmitName);
    }

    /// Handle one decoded line from the client
    pub fn handle_line(&mut self, line: &str) -> Flow {
        match &self.state {
            SessionState::AwaitingName => self.claim_name(line),
            SessionState::Active(name) => {
                let name = name.clone();
                self.handle_active(&name, line)
            }
            SessionState::Closed => Flow::Close,
        }
    }

    /// Tear the session down
    ///
    /// Releases the name and broadcasts the departure exactly once, however
    /// many times and from however many paths this is called. Returns
    /// whether this call did the release.
    pub fn close(&mut self) -> bool {
        match std::mem::replace(&mut self.state, SessionState::Closed) {
            SessionState::Active(name) => {
                let released = self.router.depart(name.as_str());
                if released {
                    info!("Client {} ('{}') left", self.id, name);
                }
                released
            }
            SessionState::AwaitingName => {
                debug!("Client {} closed before choosing a name", self.id);
                false
            }
            SessionState::Closed => false,
        }
    }

    fn claim_name(&mut self, line: &str) -> Flow {
        if line.trim().is_empty() {
            return Flow::Continue;
        }

        let name = match DisplayName::parse(line) {
            Ok(name) => name,
            Err(e) => {
                self.reject_name(e);
                return Flow::Continue;
            }
        };

        let id = self.id;
        let accepted = ServerMessage::NameAccepted {
            name: name.to_string(),
        };
        let registered = self
            .router
            .registry()
            .register_with(&name, self.sink.clone(), |sink| {
                if let Err(e) = sink.deliver(&accepted) {
                    debug!("Client {} name acceptance dropped: {}", id, e);
                }
            });

        match registered {
            Ok(()) => {
                info!("Client {} registered as '{}'", self.id, name);
                self.router.broadcast(&ServerMessage::joined(name.as_str()));
                self.state = SessionState::Active(name);
            }
            Err(e) => self.reject_name(e),
        }
        Flow::Continue
    }

    fn reject_name(&self, err: AppError) {
        debug!("Client {} name rejected: {}", self.id, err);
        self.reply(&err.into());
        self.reply(&ServerMessage::SubmitName);
    }

    fn handle_active(&self, name: &DisplayName, line: &str) -> Flow {
        let msg = match ClientMessage::parse(line) {
            Ok(Some(msg)) => msg,
            Ok(None) => return Flow::Continue,
            Err(e) => {
                self.reply(&e.into());
                return Flow::Continue;
            }
        };

        match msg {
            ClientMessage::Chat { text } => {
                self.router.broadcast(&ServerMessage::Chat {
                    from: name.to_string(),
                    text,
                });
            }
            ClientMessage::Private { recipient, text } => {
                self.router.send_private(name.as_str(), &recipient, &text);
            }
            ClientMessage::Users => {
                self.reply(&ServerMessage::Users {
                    names: self.router.registry().names(),
                });
            }
            ClientMessage::Quit => {
                debug!("Client {} ('{}') sent quit", self.id, name);
                self.reply(&ServerMessage::Bye);
                return Flow::Close;
            }
        }
        Flow::Continue
    }

    fn reply(&self, msg: &ServerMessage) {
        if let Err(e) = self.sink.deliver(msg) {
            debug!("Client {} reply dropped: {}", self.id, e);
        }
    }
}
