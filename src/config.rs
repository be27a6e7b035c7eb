//! Runtime configuration
//!
//! Everything is a constant except the address, which the first
//! command-line argument may override. A bare port is shorthand for
//! `127.0.0.1:<port>`.

/// Default chat server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:5000";

/// Default echo server address
pub const DEFAULT_ECHO_ADDR: &str = "127.0.0.1:5001";

/// Default UDP echo server address
pub const DEFAULT_UDP_ADDR: &str = "127.0.0.1:5002";

/// Worker pool size: sessions served concurrently by the threaded server
pub const MAX_SESSIONS: usize = 64;

/// Longest accepted protocol line, in bytes
pub const MAX_LINE_LENGTH: usize = 4096;

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind
    pub addr: String,
    /// Concurrent session limit; further connections wait to be accepted
    pub max_sessions: usize,
}

impl ServerConfig {
    /// Build from process arguments (program name already skipped)
    pub fn from_args<I>(args: I, default_addr: &str) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            addr: addr_from_args(args, default_addr),
            max_sessions: MAX_SESSIONS,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            max_sessions: MAX_SESSIONS,
        }
    }
}

/// Pick the address from the first argument, or fall back to the default
pub fn addr_from_args<I>(args: I, default_addr: &str) -> String
where
    I: IntoIterator<Item = String>,
{
    match args.into_iter().next() {
        Some(arg) if arg.parse::<u16>().is_ok() => format!("127.0.0.1:{}", arg),
        Some(arg) => arg,
        None => default_addr.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_addr() {
        assert_eq!(addr_from_args(Vec::new(), DEFAULT_ADDR), DEFAULT_ADDR);
    }

    #[test]
    fn test_port_override() {
        let args = vec!["6000".to_string()];
        assert_eq!(addr_from_args(args, DEFAULT_ADDR), "127.0.0.1:6000");
    }

    #[test]
    fn test_full_addr_override() {
        let config = ServerConfig::from_args(vec!["0.0.0.0:7000".to_string()], DEFAULT_ADDR);
        assert_eq!(config.addr, "0.0.0.0:7000");
        assert_eq!(config.max_sessions, MAX_SESSIONS);
    }
}
