//! Transport selection.
//!
//! Both sides read `RPC_TRANSPORT` so the shim and the server agree without
//! any negotiation: `unix` (default) is a stream socket at a fixed
//! filesystem path, `tcp` a fixed host/port. The choice affects only how
//! the byte stream is set up; the message set is identical on both.

use std::fmt;

/// Filesystem path of the Unix-domain endpoint. The server unlinks and
/// rebinds it at startup.
pub const UNIX_SOCKET_PATH: &str = "/tmp/p3_tb";

pub const TCP_HOST: &str = "localhost";
pub const TCP_PORT: u16 = 9999;

/// Name of the environment variable selecting the transport.
pub const TRANSPORT_ENV: &str = "RPC_TRANSPORT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    #[default]
    Unix,
    Tcp,
}

impl Transport {
    /// Parse a transport name. Matching is case-insensitive; anything that
    /// is not `tcp` falls back to the Unix transport.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("tcp") {
            Transport::Tcp
        } else {
            Transport::Unix
        }
    }

    /// Read the transport from `RPC_TRANSPORT`, defaulting to Unix.
    pub fn from_env() -> Self {
        match std::env::var(TRANSPORT_ENV) {
            Ok(v) => Self::parse(&v),
            Err(_) => Transport::Unix,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Transport::Unix => "unix",
            Transport::Tcp => "tcp",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Transport::parse("tcp"), Transport::Tcp);
        assert_eq!(Transport::parse("TCP"), Transport::Tcp);
        assert_eq!(Transport::parse("Tcp"), Transport::Tcp);
        assert_eq!(Transport::parse("unix"), Transport::Unix);
    }

    #[test]
    fn unknown_values_fall_back_to_unix() {
        assert_eq!(Transport::parse(""), Transport::Unix);
        assert_eq!(Transport::parse("udp"), Transport::Unix);
        assert_eq!(Transport::parse("vsock"), Transport::Unix);
    }
}
