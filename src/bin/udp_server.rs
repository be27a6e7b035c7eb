//! UDP Echo Server - Entry Point

use std::env;

use tokio::net::UdpSocket;
use tracing::error;

use line_chat::config::{addr_from_args, DEFAULT_UDP_ADDR};
use line_chat::udp;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    line_chat::init_tracing("line_chat=info");

    let addr = addr_from_args(env::args().skip(1), DEFAULT_UDP_ADDR);
    let socket = UdpSocket::bind(&addr).await.map_err(|e| {
        error!("Failed to bind {}: {}", addr, e);
        e
    })?;

    udp::serve(socket).await?;
    Ok(())
}
