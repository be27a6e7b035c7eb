//! Echo Client - Entry Point

use std::env;

use line_chat::config::{addr_from_args, DEFAULT_ECHO_ADDR};
use line_chat::echo;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    line_chat::init_tracing("line_chat=warn");

    let addr = addr_from_args(env::args().skip(1), DEFAULT_ECHO_ADDR);
    echo::run_client(&addr, tokio::io::stdin(), tokio::io::stdout()).await?;
    Ok(())
}
