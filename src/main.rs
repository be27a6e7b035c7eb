//! Line Chat Server - Entry Point
//!
//! Binds the listener and runs the task-per-connection chat server.

use std::env;

use tracing::{error, info};

use line_chat::config::DEFAULT_ADDR;
use line_chat::{ChatServer, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=line_chat=trace
    line_chat::init_tracing("line_chat=info");

    // Get bind address from command line or use default
    let config = ServerConfig::from_args(env::args().skip(1), DEFAULT_ADDR);

    let server = match ChatServer::bind(&config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to bind {}: {}", config.addr, e);
            return Err(e.into());
        }
    };
    info!("Chat Server listening on {}", server.local_addr()?);

    server.run().await;
    Ok(())
}
