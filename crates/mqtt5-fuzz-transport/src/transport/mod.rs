//! Synchronous stream-transport capability set consumed by clients under test.

pub mod fuzz;

use crate::error::Result;
use std::time::Duration;

/// Outcome of a readability poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Readable,
    TimedOut,
    Failed,
}

impl Readiness {
    /// `1`, `0` or `-1`, the convention of C transport layers.
    #[must_use]
    pub fn as_status(self) -> i32 {
        match self {
            Self::Readable => 1,
            Self::TimedOut => 0,
            Self::Failed => -1,
        }
    }

    #[must_use]
    pub fn is_readable(self) -> bool {
        self == Self::Readable
    }
}

/// The transport a client is configured with.
///
/// Clients hold it as `Box<dyn StreamTransport>` and never see the concrete
/// type. None of the calls may block longer than their timeout; in-process
/// implementations return immediately.
pub trait StreamTransport {
    /// Establishes a connection
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established
    fn connect(&mut self, host: &str, port: u16, timeout: Duration) -> Result<()>;

    /// Reads up to `buf.len()` bytes
    ///
    /// # Errors
    ///
    /// Returns a transient `WouldBlock` error when nothing is available
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Writes `buf` and returns the number of bytes accepted
    ///
    /// # Errors
    ///
    /// Returns an error if the write operation fails
    fn write(&mut self, buf: &[u8], timeout: Duration) -> Result<usize>;

    fn poll_read(&mut self, timeout: Duration) -> Readiness;

    /// Closes the connection
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be closed cleanly
    fn close(&mut self) -> Result<()>;

    /// Releases everything the transport owns. Must tolerate repeated calls.
    ///
    /// # Errors
    ///
    /// Returns an error if resources could not be released
    fn destroy(&mut self) -> Result<()>;

    /// Code describing the last failure, `0` if none.
    fn last_errno(&self) -> i32 {
        0
    }

    fn is_connected(&self) -> bool {
        false
    }
}

/// Destroys and drops a transport handle. `None` is a no-op.
///
/// # Errors
///
/// Propagates the error of [`StreamTransport::destroy`]
pub fn destroy_transport(transport: Option<Box<dyn StreamTransport>>) -> Result<()> {
    match transport {
        Some(mut transport) => transport.destroy(),
        None => Ok(()),
    }
}
