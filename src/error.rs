//! # Error Types
//!
//! Error handling for the master-server query client.
//!
//! Every fallible operation returns a [`Result`] carrying a [`ProtocolError`].
//! Each error also maps onto a compact [`ErrorKind`] which keeps the numeric
//! codes of the legacy client, so a session can expose a "last error" slot
//! that callers may poll and clear.
//!
//! ## Error Categories
//! - **Auth** (`0x1000` block): challenge not approved, key not verified,
//!   malformed credential
//! - **File** (`0x4000` block): credential file could not be read
//! - **Socket** (`0x8000` block): timeouts, closed or unopened sockets,
//!   length overflow, generic socket failures
//!
//! ## Example Usage
//! ```rust
//! use master_query::error::{ErrorCategory, ErrorKind, ProtocolError};
//!
//! let err = ProtocolError::LengthOverflow(70_000);
//! assert_eq!(err.kind(), Some(ErrorKind::LengthOverflow));
//! assert_eq!(ErrorKind::LengthOverflow.code(), 0x8003);
//! assert_eq!(ErrorKind::LengthOverflow.category(), ErrorCategory::Socket);
//! ```

use std::fmt;
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Response frames
    pub const ERR_SHORT_RESPONSE_HEADER: &str = "Query response header shorter than 5 bytes";
    pub const ERR_EMPTY_CHALLENGE: &str = "Challenge frame missing or empty";

    pub const ERR_SHORT_READ: &str = "Short read before deadline";
}

/// ProtocolError is the primary error type for all client operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Master server did not approve challenge response")]
    ApproveFailure,

    #[error("Master server did not verify credential")]
    VerifyFailure,

    #[error("Credential not in recognized format")]
    MalformedCredential,

    #[error("Failed to read credential file: {0}")]
    ReadFailure(String),

    #[error("Connection timed out")]
    Timeout,

    #[error("Attempt to use a closed socket")]
    SocketClosed,

    #[error("Attempt to use a socket that was never opened")]
    SocketNotOpen,

    #[error("Socket failure: {0}")]
    SocketFailure(String),

    #[error("Frame length {0} exceeds limit, connection dropped")]
    LengthOverflow(u32),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Server record too short: {len} bytes")]
    MalformedRecord { len: usize },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ProtocolError {
    /// Classification of this error, if it belongs to one of the legacy blocks
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ProtocolError::ApproveFailure => Some(ErrorKind::ApproveFailure),
            ProtocolError::VerifyFailure => Some(ErrorKind::VerifyFailure),
            ProtocolError::MalformedCredential => Some(ErrorKind::MalformedCredential),
            ProtocolError::ReadFailure(_) => Some(ErrorKind::ReadFailure),
            ProtocolError::Timeout => Some(ErrorKind::Timeout),
            ProtocolError::SocketClosed => Some(ErrorKind::SocketClosed),
            ProtocolError::SocketNotOpen => Some(ErrorKind::SocketNotOpen),
            ProtocolError::SocketFailure(_) => Some(ErrorKind::SocketFailure),
            ProtocolError::LengthOverflow(_) => Some(ErrorKind::LengthOverflow),
            ProtocolError::Io(e) => Some(ErrorKind::from_io(e)),
            ProtocolError::MalformedResponse(_)
            | ProtocolError::MalformedRecord { .. }
            | ProtocolError::InvalidQuery(_)
            | ProtocolError::ConfigError(_) => None,
        }
    }

    /// Whether this error leaves the connection unusable
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            Some(ErrorKind::LengthOverflow)
                | Some(ErrorKind::ApproveFailure)
                | Some(ErrorKind::VerifyFailure)
                | Some(ErrorKind::SocketClosed)
        )
    }

    /// Build the error matching a socket-level I/O failure
    pub fn from_socket(err: io::Error) -> Self {
        match ErrorKind::from_io(&err) {
            ErrorKind::Timeout => ProtocolError::Timeout,
            ErrorKind::SocketClosed => ProtocolError::SocketClosed,
            ErrorKind::SocketNotOpen => ProtocolError::SocketNotOpen,
            _ => ProtocolError::SocketFailure(err.to_string()),
        }
    }
}

/// Group an [`ErrorKind`] belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Auth,
    File,
    Socket,
}

/// Compact error classification, as stored in a session's last-error slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ApproveFailure,
    VerifyFailure,
    MalformedCredential,
    ReadFailure,
    Timeout,
    SocketClosed,
    LengthOverflow,
    SocketNotOpen,
    SocketFailure,
}

impl ErrorKind {
    /// Legacy numeric code
    pub fn code(self) -> u16 {
        match self {
            ErrorKind::ApproveFailure => 0x1001,
            ErrorKind::VerifyFailure => 0x1002,
            ErrorKind::MalformedCredential => 0x1003,
            ErrorKind::ReadFailure => 0x4001,
            ErrorKind::Timeout => 0x8001,
            ErrorKind::SocketClosed => 0x8002,
            ErrorKind::LengthOverflow => 0x8003,
            ErrorKind::SocketNotOpen => 0x8004,
            ErrorKind::SocketFailure => 0x8005,
        }
    }

    pub fn category(self) -> ErrorCategory {
        match self.code() & 0xF000 {
            0x1000 => ErrorCategory::Auth,
            0x4000 => ErrorCategory::File,
            _ => ErrorCategory::Socket,
        }
    }

    /// Classify an OS-level socket error
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotConnected => ErrorKind::SocketNotOpen,
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::UnexpectedEof => ErrorKind::SocketClosed,
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ErrorKind::Timeout,
            _ => ErrorKind::SocketFailure,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} (0x{:04X})", self, self.code())
    }
}

impl From<ErrorKind> for ProtocolError {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::ApproveFailure => ProtocolError::ApproveFailure,
            ErrorKind::VerifyFailure => ProtocolError::VerifyFailure,
            ErrorKind::MalformedCredential => ProtocolError::MalformedCredential,
            ErrorKind::ReadFailure => ProtocolError::ReadFailure(String::new()),
            ErrorKind::Timeout => ProtocolError::Timeout,
            ErrorKind::SocketClosed => ProtocolError::SocketClosed,
            ErrorKind::SocketNotOpen => ProtocolError::SocketNotOpen,
            ErrorKind::SocketFailure => ProtocolError::SocketFailure(String::new()),
            ErrorKind::LengthOverflow => ProtocolError::LengthOverflow(0),
        }
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_categories() {
        assert_eq!(ErrorKind::ApproveFailure.code(), 0x1001);
        assert_eq!(ErrorKind::VerifyFailure.category(), ErrorCategory::Auth);
        assert_eq!(ErrorKind::ReadFailure.category(), ErrorCategory::File);
        assert_eq!(ErrorKind::SocketFailure.code(), 0x8005);
        assert_eq!(ErrorKind::Timeout.category(), ErrorCategory::Socket);
    }

    #[test]
    fn test_io_classification() {
        let closed = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        assert_eq!(ErrorKind::from_io(&closed), ErrorKind::SocketClosed);

        let not_open = io::Error::new(io::ErrorKind::NotConnected, "nope");
        assert!(matches!(
            ProtocolError::from_socket(not_open),
            ProtocolError::SocketNotOpen
        ));

        let other = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        assert!(matches!(
            ProtocolError::from_socket(other),
            ProtocolError::SocketFailure(_)
        ));
    }

    #[test]
    fn test_fatal_errors() {
        assert!(ProtocolError::LengthOverflow(70_000).is_fatal());
        assert!(ProtocolError::ApproveFailure.is_fatal());
        assert!(!ProtocolError::MalformedRecord { len: 3 }.is_fatal());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::LengthOverflow.to_string(), "LengthOverflow (0x8003)");
    }
}
