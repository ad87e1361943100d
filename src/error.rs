//! Error types
//!
//! Setup failures (bind, bad standby media) surface as `Error` from the
//! server/client entry points. Per-connection failures end that session only.

use std::fmt;
use std::io;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Transport I/O failure
    Io(io::Error),
    /// Peer sent something the codec cannot accept
    Protocol(ProtocolError),
    /// Invalid configuration or setup input
    Config(String),
    /// Operation did not complete in time
    Timeout,
}

/// Wire-level protocol violations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Message type byte not recognized
    UnknownMessageType(u8),
    /// Declared payload length exceeds the configured maximum
    MessageTooLarge { size: usize, max: usize },
    /// Payload ended before a field was complete
    Truncated(&'static str),
    /// Stream closed partway through a message
    UnexpectedEof(&'static str),
    /// String field was not valid UTF-8
    InvalidUtf8,
    /// Message is valid but not expected in this direction
    UnexpectedMessage(String),
}

impl Error {
    /// Whether this error is an ordinary end of the connection
    pub fn is_disconnect(&self) -> bool {
        match self {
            Error::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ),
            Error::Protocol(ProtocolError::UnexpectedEof(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Protocol(e) => write!(f, "Protocol error: {}", e),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Timeout => write!(f, "Operation timed out"),
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::UnknownMessageType(t) => write!(f, "Unknown message type: 0x{:02x}", t),
            ProtocolError::MessageTooLarge { size, max } => {
                write!(f, "Message too large: {} bytes (max {})", size, max)
            }
            ProtocolError::Truncated(what) => write!(f, "Truncated {}", what),
            ProtocolError::UnexpectedEof(what) => write!(f, "Stream closed inside {}", what),
            ProtocolError::InvalidUtf8 => write!(f, "Invalid UTF-8 in string field"),
            ProtocolError::UnexpectedMessage(what) => write!(f, "Unexpected message: {}", what),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Protocol(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnect_classification() {
        let reset: Error = io::Error::from(io::ErrorKind::ConnectionReset).into();
        assert!(reset.is_disconnect());

        let denied: Error = io::Error::from(io::ErrorKind::PermissionDenied).into();
        assert!(!denied.is_disconnect());

        let proto: Error = ProtocolError::InvalidUtf8.into();
        assert!(!proto.is_disconnect());

        // Peer vanished mid-message
        let cut: Error = ProtocolError::UnexpectedEof("message payload").into();
        assert!(cut.is_disconnect());

        let short: Error = ProtocolError::Truncated("image header").into();
        assert!(!short.is_disconnect());
    }

    #[test]
    fn test_display() {
        let err: Error = ProtocolError::MessageTooLarge { size: 10, max: 5 }.into();
        assert_eq!(
            err.to_string(),
            "Protocol error: Message too large: 10 bytes (max 5)"
        );
        assert_eq!(
            ProtocolError::UnknownMessageType(0x7f).to_string(),
            "Unknown message type: 0x7f"
        );
    }
}
