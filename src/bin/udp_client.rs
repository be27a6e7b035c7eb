//! UDP Echo Client - Entry Point

use std::env;

use tokio::net::lookup_host;

use line_chat::config::{addr_from_args, DEFAULT_UDP_ADDR};
use line_chat::udp;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    line_chat::init_tracing("line_chat=warn");

    let addr = addr_from_args(env::args().skip(1), DEFAULT_UDP_ADDR);
    let server = lookup_host(&addr)
        .await?
        .next()
        .ok_or_else(|| format!("could not resolve {}", addr))?;

    udp::run_client(server, tokio::io::stdin(), tokio::io::stdout()).await?;
    Ok(())
}
