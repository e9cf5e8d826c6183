use crate::constants::{EAGAIN, ERR_TCP_TRANSPORT_CONNECTION_TIMEOUT, TRANSPORT_FAILURE};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FuzzError>;

/// Why a read returned no bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WouldBlockCause {
    /// `read` was called before `connect` or after `close`.
    NotConnected,
    /// Both the injected replies and the raw input are exhausted.
    Drained,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FuzzError {
    #[error("No data available ({0:?})")]
    WouldBlock(WouldBlockCause),

    #[error("Malformed packet: {0}")]
    MalformedPacket(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Connection refused: return code 0x{0:02X}")]
    ConnectionRefused(u8),

    #[error("Not connected")]
    NotConnected,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl FuzzError {
    /// Transient errors are retried by the client and never end a run.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::WouldBlock(_))
    }

    /// OS-style errno paired with the failure, `0` when there is none.
    #[must_use]
    pub fn errno(&self) -> i32 {
        match self {
            Self::WouldBlock(_) => EAGAIN,
            _ => 0,
        }
    }

    /// Code a transport stores as its `last_errno`.
    #[must_use]
    pub fn transport_errno(&self) -> i32 {
        match self {
            Self::WouldBlock(_) => ERR_TCP_TRANSPORT_CONNECTION_TIMEOUT,
            _ => 0,
        }
    }

    #[must_use]
    pub fn status_code(&self) -> i32 {
        TRANSPORT_FAILURE
    }
}

impl From<std::io::Error> for FuzzError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for FuzzError {
    fn from(err: serde_json::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<FuzzError> for std::io::Error {
    fn from(err: FuzzError) -> Self {
        let kind = match &err {
            FuzzError::WouldBlock(_) => std::io::ErrorKind::WouldBlock,
            FuzzError::NotConnected => std::io::ErrorKind::NotConnected,
            FuzzError::ConnectionRefused(_) => std::io::ErrorKind::ConnectionRefused,
            FuzzError::MalformedPacket(_) | FuzzError::ProtocolError(_) => {
                std::io::ErrorKind::InvalidData
            }
            FuzzError::Configuration(_) => std::io::ErrorKind::InvalidInput,
            FuzzError::Io(_) => std::io::ErrorKind::Other,
        };
        std::io::Error::new(kind, err)
    }
}
