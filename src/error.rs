//! Error types for the chat server
//!
//! Defines application-level errors and message send errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// Covers both fatal errors (connection termination) and
/// protocol errors (reported to the client as an `ERROR` line).
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Line framing error: oversized line or IO failure while decoding (fatal)
    #[error("Line codec error: {0}")]
    Codec(#[from] tokio_util::codec::LinesCodecError),

    /// Display name already registered by another session
    #[error("Name taken: {0}")]
    NameTaken(String),

    /// Display name failed validation
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// Private message addressed to a name nobody holds
    #[error("Recipient not found: {0}")]
    RecipientNotFound(String),

    /// `@name` line without a recipient or without text
    #[error("Malformed private message")]
    MalformedPrivate,
}

/// Message send errors
///
/// Occurs when a line cannot be queued for one specific client.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let io = AppError::Io(std::io::Error::from(std::io::ErrorKind::BrokenPipe));
        assert!(io.to_string().starts_with("IO error"));
        assert_eq!(
            AppError::NameTaken("Alice".to_string()).to_string(),
            "Name taken: Alice"
        );
        assert_eq!(SendError::ChannelClosed.to_string(), "Channel closed");
    }
}
