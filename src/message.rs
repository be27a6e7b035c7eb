//! Message protocol definitions
//!
//! Line-based bidirectional protocol. Every frame is one UTF-8 line; the
//! line codec strips the terminator before anything here sees it.
//!
//! Server lines start with an upper-case tag (`SUBMITNAME`, `PRIVATE`, ...)
//! except broadcast chat, which is `<sender>: <text>`. Display names can't
//! contain spaces, so the two never collide.

use std::fmt;

use crate::error::AppError;

/// Private-message marker: `@<recipient> <text>`
pub const PRIVATE_MARKER: char = '@';

/// Quit token
pub const QUIT_COMMAND: &str = "/quit";

/// User listing command
pub const USERS_COMMAND: &str = "/users";

const TAG_WELCOME: &str = "WELCOME";
const TAG_SUBMIT_NAME: &str = "SUBMITNAME";
const TAG_NAME_ACCEPTED: &str = "NAMEACCEPTED";
const TAG_PRIVATE: &str = "PRIVATE";
const TAG_NOTICE: &str = "NOTICE";
const TAG_USERS: &str = "USERS";
const TAG_ERROR: &str = "ERROR";
const TAG_BYE: &str = "BYE";

/// Client → Server message, once the session is active
///
/// Lines sent while the server waits for a name are not parsed here; they
/// are taken verbatim as the requested name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Broadcast to everyone
    Chat { text: String },
    /// Deliver to one named recipient (and echo to the sender)
    Private { recipient: String, text: String },
    /// List registered names
    Users,
    /// Leave the chat
    Quit,
}

impl ClientMessage {
    /// Classify one line from an active client
    ///
    /// Returns `Ok(None)` for blank lines, which are ignored.
    pub fn parse(line: &str) -> Result<Option<Self>, AppError> {
        if line.trim().is_empty() {
            return Ok(None);
        }

        match line {
            QUIT_COMMAND => return Ok(Some(Self::Quit)),
            USERS_COMMAND => return Ok(Some(Self::Users)),
            _ => {}
        }

        if let Some(rest) = line.strip_prefix(PRIVATE_MARKER) {
            let (recipient, text) = rest.split_once(' ').ok_or(AppError::MalformedPrivate)?;
            if recipient.is_empty() || text.trim().is_empty() {
                return Err(AppError::MalformedPrivate);
            }
            return Ok(Some(Self::Private {
                recipient: recipient.to_string(),
                text: text.to_string(),
            }));
        }

        Ok(Some(Self::Chat {
            text: line.to_string(),
        }))
    }
}

/// Server → Client message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Greeting sent once per accepted connection
    Welcome { banner: String },
    /// Request a display name
    SubmitName,
    /// Display name accepted; the session is now active
    NameAccepted { name: String },
    /// Broadcast chat line
    Chat { from: String, text: String },
    /// Private message, sent to both sender and recipient
    Private {
        from: String,
        to: String,
        text: String,
    },
    /// Server notice (joins, leaves)
    Notice { text: String },
    /// Currently registered names, sorted
    Users { names: Vec<String> },
    /// Error report for the receiving client only
    Error { message: String },
    /// Acknowledges `/quit`; the server closes afterwards
    Bye,
}

impl ServerMessage {
    pub fn joined(name: &str) -> Self {
        Self::Notice {
            text: format!("{} has joined", name),
        }
    }

    pub fn left(name: &str) -> Self {
        Self::Notice {
            text: format!("{} has left", name),
        }
    }

    /// Parse a line received from the server
    ///
    /// Returns `None` for lines that match no known form.
    pub fn parse(line: &str) -> Option<Self> {
        let (tag, rest) = match line.split_once(' ') {
            Some((tag, rest)) => (tag, Some(rest)),
            None => (line, None),
        };

        match (tag, rest) {
            (TAG_SUBMIT_NAME, None) => Some(Self::SubmitName),
            (TAG_BYE, None) => Some(Self::Bye),
            (TAG_USERS, None) => Some(Self::Users { names: Vec::new() }),
            (TAG_USERS, Some(rest)) => Some(Self::Users {
                names: rest.split_whitespace().map(str::to_string).collect(),
            }),
            (TAG_WELCOME, Some(banner)) => Some(Self::Welcome {
                banner: banner.to_string(),
            }),
            (TAG_NAME_ACCEPTED, Some(name)) => Some(Self::NameAccepted {
                name: name.to_string(),
            }),
            (TAG_NOTICE, Some(text)) => Some(Self::Notice {
                text: text.to_string(),
            }),
            (TAG_ERROR, Some(message)) => Some(Self::Error {
                message: message.to_string(),
            }),
            (TAG_PRIVATE, Some(rest)) => {
                let mut parts = rest.splitn(3, ' ');
                let from = parts.next()?;
                let to = parts.next()?;
                let text = parts.next()?;
                Some(Self::Private {
                    from: from.to_string(),
                    to: to.to_string(),
                    text: text.to_string(),
                })
            }
            _ => {
                let (from, text) = line.split_once(": ")?;
                if from.is_empty() || from.contains(' ') {
                    return None;
                }
                Some(Self::Chat {
                    from: from.to_string(),
                    text: text.to_string(),
                })
            }
        }
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Welcome { banner } => write!(f, "{} {}", TAG_WELCOME, banner),
            Self::SubmitName => f.write_str(TAG_SUBMIT_NAME),
            Self::NameAccepted { name } => write!(f, "{} {}", TAG_NAME_ACCEPTED, name),
            Self::Chat { from, text } => write!(f, "{}: {}", from, text),
            Self::Private { from, to, text } => {
                write!(f, "{} {} {} {}", TAG_PRIVATE, from, to, text)
            }
            Self::Notice { text } => write!(f, "{} {}", TAG_NOTICE, text),
            Self::Users { names } if names.is_empty() => f.write_str(TAG_USERS),
            Self::Users { names } => write!(f, "{} {}", TAG_USERS, names.join(" ")),
            Self::Error { message } => write!(f, "{} {}", TAG_ERROR, message),
            Self::Bye => f.write_str(TAG_BYE),
        }
    }
}

/// Convert AppError to ServerMessage for client notification
impl From<AppError> for ServerMessage {
    fn from(err: AppError) -> Self {
        let message = match &err {
            AppError::NameTaken(name) => format!("name '{}' is already taken", name),
            AppError::InvalidName(reason) => format!("invalid name: {}", reason),
            AppError::RecipientNotFound(name) => format!("no such user: {}", name),
            AppError::MalformedPrivate => {
                format!("usage: {}<name> <message>", PRIVATE_MARKER)
            }
            // Fatal errors are not typically converted (connection closes)
            _ => "internal error".to_string(),
        };
        ServerMessage::Error { message }
    }
}
