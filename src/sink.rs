//! Outbound message sinks
//!
//! A sink queues lines for one specific client. Routing only ever talks to
//! sinks, so the same registry and router serve both the
//! task-per-connection server and the single-threaded reactor.

use tokio::sync::mpsc;

use crate::error::SendError;
use crate::message::ServerMessage;

/// Handle for delivering server messages to one client
///
/// `deliver` must not block: it is called while routing on behalf of other
/// sessions, and in the reactor from inside the event loop. Implementations
/// queue the message and return; the transport drains the queue in order.
pub trait Sink: Clone {
    fn deliver(&self, msg: &ServerMessage) -> Result<(), SendError>;
}

/// Sink backed by a channel drained by the connection's writer task
///
/// One writer per connection keeps lines to that client in send order. The
/// queue is unbounded: a slow reader accumulates lines instead of losing
/// them, and only a writer that has gone away counts as a failed delivery.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<ServerMessage>,
}

impl ChannelSink {
    /// Create a sink and the receiver its writer task should drain
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Sink for ChannelSink {
    fn deliver(&self, msg: &ServerMessage) -> Result<(), SendError> {
        self.sender
            .send(msg.clone())
            .map_err(|_| SendError::ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sink_delivers_in_order() {
        let (sink, mut rx) = ChannelSink::channel();

        sink.deliver(&ServerMessage::SubmitName).unwrap();
        sink.deliver(&ServerMessage::Bye).unwrap();

        assert_eq!(rx.recv().await, Some(ServerMessage::SubmitName));
        assert_eq!(rx.recv().await, Some(ServerMessage::Bye));
    }

    #[tokio::test]
    async fn test_channel_sink_reports_closed() {
        let (sink, rx) = ChannelSink::channel();
        drop(rx);

        assert_eq!(
            sink.deliver(&ServerMessage::SubmitName),
            Err(SendError::ChannelClosed)
        );
    }

    #[tokio::test]
    async fn test_channel_sink_keeps_backlog() {
        let (sink, mut rx) = ChannelSink::channel();

        for i in 0..10_000 {
            sink.deliver(&ServerMessage::Notice {
                text: format!("n{}", i),
            })
            .unwrap();
        }

        for i in 0..10_000 {
            assert_eq!(
                rx.recv().await,
                Some(ServerMessage::Notice {
                    text: format!("n{}", i)
                })
            );
        }
    }
}
