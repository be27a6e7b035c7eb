//! Echo Server - Entry Point

use std::env;

use tokio::net::TcpListener;
use tracing::error;

use line_chat::config::{addr_from_args, DEFAULT_ECHO_ADDR};
use line_chat::echo;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    line_chat::init_tracing("line_chat=info");

    let addr = addr_from_args(env::args().skip(1), DEFAULT_ECHO_ADDR);
    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        error!("Failed to bind {}: {}", addr, e);
        e
    })?;

    echo::serve(listener).await;
    Ok(())
}
