//! Reactor Chat Server - Entry Point
//!
//! Runs the chat protocol on a single-threaded `mio` event loop.

use std::env;

use tracing::error;

use line_chat::config::DEFAULT_ADDR;
use line_chat::{Reactor, ServerConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    line_chat::init_tracing("line_chat=info");

    let config = ServerConfig::from_args(env::args().skip(1), DEFAULT_ADDR);

    let mut reactor = match Reactor::bind(&config.addr) {
        Ok(reactor) => reactor,
        Err(e) => {
            error!("Failed to bind {}: {}", config.addr, e);
            return Err(e.into());
        }
    };

    reactor.run()?;
    Ok(())
}
