//! Basic type definitions for the chat server
//!
//! Provides newtype wrappers for type safety:
//! - `ClientId`: UUID-based connection identifier (log correlation)
//! - `DisplayName`: validated, registry-unique user name

use std::borrow::Borrow;

use uuid::Uuid;

use crate::error::AppError;

/// Longest accepted display name, in characters
pub const MAX_NAME_LENGTH: usize = 32;

/// Unique connection identifier (newtype pattern)
///
/// Wraps a UUID v4. Names are only known after the handshake, so every
/// connection gets one of these at accept time for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub Uuid);

impl ClientId {
    /// Create a new random client ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Display name claimed by a session
///
/// Always trimmed, non-empty, free of whitespace, and not starting with the
/// private-message marker or the command prefix, so it can be embedded in
/// space-separated protocol lines.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DisplayName(String);

impl DisplayName {
    /// Validate a raw line supplied by a client as a display name
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let name = raw.trim();

        if name.is_empty() {
            return Err(AppError::InvalidName("name must not be empty".to_string()));
        }
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(AppError::InvalidName(format!(
                "name must be at most {} characters",
                MAX_NAME_LENGTH
            )));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(AppError::InvalidName(
                "name must not contain spaces".to_string(),
            ));
        }
        if name.starts_with('@') || name.starts_with('/') {
            return Err(AppError::InvalidName(
                "name must not start with '@' or '/'".to_string(),
            ));
        }

        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for DisplayName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DisplayName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_id_unique() {
        let id1 = ClientId::new();
        let id2 = ClientId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_display_name_trimmed() {
        let name = DisplayName::parse("  Alice \r").unwrap();
        assert_eq!(name.as_str(), "Alice");
    }

    #[test]
    fn test_display_name_rejects_invalid() {
        assert!(DisplayName::parse("").is_err());
        assert!(DisplayName::parse("   ").is_err());
        assert!(DisplayName::parse("Alice Smith").is_err());
        assert!(DisplayName::parse("@Alice").is_err());
        assert!(DisplayName::parse("/quit").is_err());
        assert!(DisplayName::parse(&"x".repeat(MAX_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_display_name_max_length_accepted() {
        let raw = "x".repeat(MAX_NAME_LENGTH);
        assert_eq!(DisplayName::parse(&raw).unwrap().as_str(), raw);
    }
}
