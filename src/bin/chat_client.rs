//! Chat client - Entry Point
//!
//! Connects to a chat server and relays stdin/stdout.

use std::env;

use line_chat::client;
use line_chat::config::{addr_from_args, DEFAULT_ADDR};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    line_chat::init_tracing("line_chat=warn");

    let addr = addr_from_args(env::args().skip(1), DEFAULT_ADDR);
    client::run(&addr, tokio::io::stdin(), tokio::io::stdout()).await?;
    Ok(())
}
