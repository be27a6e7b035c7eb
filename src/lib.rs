//! Line-oriented TCP Chat Server Library
//!
//! A learning-oriented chat server speaking a newline-framed text protocol,
//! with two interchangeable ways of driving sessions.
//!
//! # Features
//! - Unique display names with re-prompt on conflict
//! - Broadcast chat and `@name` private messages
//! - `/users` listing and `/quit`
//! - Join/leave notices, sent exactly once per session
//! - Line echo server/client over TCP and over UDP datagrams
//!
//! # Architecture
//! - `Registry` is the only shared state: a mutex-guarded map from name to
//!   `Sink`, with atomic check-then-insert
//! - `Router` broadcasts from a snapshot and routes private messages to the
//!   two parties only
//! - `Session` is a transport-free state machine fed one line at a time
//! - `ChatServer` drives sessions with one tokio task per connection, bounded
//!   by a semaphore; `Reactor` drives them from a single `mio` event loop
//!
//! # Example
//! ```ignore
//! use line_chat::{ChatServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = ChatServer::bind(&ServerConfig::default()).await.unwrap();
//!     server.run().await;
//! }
//! ```

pub mod client;
pub mod config;
pub mod echo;
pub mod error;
pub mod handler;
pub mod message;
pub mod reactor;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;
pub mod sink;
pub mod types;
pub mod udp;

// Re-export main types for convenience
pub use config::ServerConfig;
pub use error::{AppError, SendError};
pub use handler::handle_connection;
pub use message::{ClientMessage, ServerMessage};
pub use reactor::{Reactor, ReactorSink};
pub use registry::Registry;
pub use router::Router;
pub use server::ChatServer;
pub use session::{Flow, Session, SessionState};
pub use sink::{ChannelSink, Sink};
pub use types::{ClientId, DisplayName};

/// Install the `tracing` subscriber used by every binary
///
/// `RUST_LOG` overrides the default filter, e.g. `RUST_LOG=line_chat=debug`.
/// Output goes to stderr so it never mixes with a client's chat output.
pub fn init_tracing(default_filter: &str) {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}
