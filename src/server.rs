//! Threaded chat server
//!
//! Accept loop for the task-per-connection model. A semaphore stands in for
//! a fixed worker pool: a permit is taken before each accept, so once
//! `max_sessions` sessions are live further connections wait in the listen
//! backlog instead of spawning more tasks.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::handler::handle_connection;
use crate::registry::Registry;
use crate::router::Router;
use crate::sink::ChannelSink;

/// The task-per-connection chat server
pub struct ChatServer {
    listener: TcpListener,
    router: Router<ChannelSink>,
    permits: Arc<Semaphore>,
}

impl ChatServer {
    /// Bind the listening socket
    ///
    /// A bind failure (port in use, no permission) is returned to the
    /// caller; there is no retry.
    pub async fn bind(config: &ServerConfig) -> Result<Self, AppError> {
        let listener = TcpListener::bind(&config.addr).await?;
        Ok(Self {
            listener,
            router: Router::new(Arc::new(Registry::new())),
            permits: Arc::new(Semaphore::new(config.max_sessions)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, AppError> {
        Ok(self.listener.local_addr()?)
    }

    /// Router shared by every session of this server
    pub fn router(&self) -> Router<ChannelSink> {
        self.router.clone()
    }

    /// Run the accept loop until the process is terminated
    pub async fn run(self) {
        info!(
            "Chat server accepting on {:?} with {} session slots",
            self.listener.local_addr().ok(),
            self.permits.available_permits()
        );

        loop {
            let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else {
                // Only happens if the semaphore is closed
                break;
            };

            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    info!("New connection from {}", addr);
                    let router = self.router.clone();

                    tokio::spawn(async move {
                        let _permit = permit;
                        if let Err(e) = handle_connection(stream, router).await {
                            warn!("Connection {} ended with error: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }

        info!("Chat server shutting down");
    }
}
