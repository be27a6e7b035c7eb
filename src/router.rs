//! Routing engine
//!
//! Delivers messages to every registered session or to one named
//! recipient. A sink that refuses a message (peer gone) is
//! logged and skipped; it never aborts delivery to the others and never
//! reaches the sender as an error.

use std::sync::Arc;

use tracing::debug;

use crate::error::AppError;
use crate::message::ServerMessage;
use crate::registry::Registry;
use crate::sink::Sink;

/// Routes messages through a shared registry
#[derive(Debug)]
pub struct Router<S> {
    registry: Arc<Registry<S>>,
}

impl<S> Clone for Router<S> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<S: Sink> Router<S> {
    pub fn new(registry: Arc<Registry<S>>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry<S> {
        &self.registry
    }

    /// Send `msg` to every session registered at the time of the call
    ///
    /// Returns the number of sinks that accepted it.
    pub fn broadcast(&self, msg: &ServerMessage) -> usize {
        // Snapshot under the lock, deliver outside it
        let sinks = self.registry.all_sinks();
        let mut delivered = 0;
        for sink in &sinks {
            if deliver_logged(sink, msg) {
                delivered += 1;
            }
        }
        debug!("Broadcast delivered to {}/{} sessions", delivered, sinks.len());
        delivered
    }

    /// Deliver a private message from `sender` to `recipient`
    ///
    /// Both parties receive the same `PRIVATE` line. An unknown recipient
    /// yields one error line to the sender and nothing to anyone else.
    pub fn send_private(&self, sender: &str, recipient: &str, text: &str) {
        let Some(sender_sink) = self.registry.sink_for(sender) else {
            debug!("Private message from unregistered sender '{}' dropped", sender);
            return;
        };

        let Some(recipient_sink) = self.registry.sink_for(recipient) else {
            debug!("Private message from '{}' to unknown '{}'", sender, recipient);
            deliver_logged(
                &sender_sink,
                &AppError::RecipientNotFound(recipient.to_string()).into(),
            );
            return;
        };

        let msg = ServerMessage::Private {
            from: sender.to_string(),
            to: recipient.to_string(),
            text: text.to_string(),
        };

        deliver_logged(&sender_sink, &msg);
        if sender != recipient {
            deliver_logged(&recipient_sink, &msg);
        }
    }

    /// Remove `name` and tell everyone left, as one step
    ///
    /// Returns `false` (and sends nothing) if the name was already gone, so
    /// a session torn down from two paths produces a single notice.
    pub fn depart(&self, name: &str) -> bool {
        let notice = ServerMessage::left(name);
        self.registry.unregister_with(name, |remaining| {
            for sink in remaining {
                deliver_logged(sink, &notice);
            }
        })
    }
}

fn deliver_logged<S: Sink>(sink: &S, msg: &ServerMessage) -> bool {
    match sink.deliver(msg) {
        Ok(()) => true,
        Err(e) => {
            debug!("Dropping message for one recipient: {}", e);
            false
        }
    }
}
