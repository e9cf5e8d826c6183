use super::{Readiness, StreamTransport};
use crate::autopilot::synthesize;
use crate::config::FuzzConfig;
use crate::error::{FuzzError, Result, WouldBlockCause};
use crate::mode::FuzzMode;
use crate::rx_buffer::InjectedRx;
use bytes::Bytes;
use serde::Serialize;
use std::cell::Cell;
use std::num::NonZeroUsize;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransportStats {
    pub bytes_from_rx: usize,
    pub bytes_from_input: usize,
    pub bytes_written: usize,
    pub writes: usize,
    pub replies: usize,
    pub replies_dropped: usize,
    pub failed_reads: usize,
}

/// Read-only view of a transport's counters that outlives the transport.
#[derive(Debug, Clone, Default)]
pub struct StatsHandle(Rc<Cell<TransportStats>>);

impl StatsHandle {
    #[must_use]
    pub fn get(&self) -> TransportStats {
        self.0.get()
    }

    fn update(&self, f: impl FnOnce(&mut TransportStats)) {
        let mut stats = self.0.get();
        f(&mut stats);
        self.0.set(stats);
    }
}

/// Emulated broker connection fed from a fuzzer-supplied buffer.
///
/// Reads drain synthesized replies first and raw input second, so a reply
/// to the client's last write is always seen before further fuzz bytes.
/// `cursor <= input.len()` holds at all times.
#[derive(Debug)]
pub struct FuzzTransport {
    input: Bytes,
    cursor: usize,
    rx: InjectedRx,
    connected: bool,
    autopilot: bool,
    mode: FuzzMode,
    fragment_limit: Option<NonZeroUsize>,
    last_errno: i32,
    stats: StatsHandle,
    destroyed: bool,
}

impl FuzzTransport {
    /// Wraps `input` for one run. A `Dynamic` mode is resolved here by
    /// consuming the first input byte.
    #[must_use]
    pub fn new(input: impl Into<Bytes>, config: &FuzzConfig) -> Self {
        let input = input.into();
        let (mode, cursor) = config.mode.resolve(&input);
        if config.mode == FuzzMode::Dynamic {
            debug!(
                selector = input.first().copied(),
                effective = %mode,
                "Resolved dynamic fuzz mode"
            );
        }

        Self {
            input,
            cursor,
            rx: InjectedRx::new(),
            connected: false,
            autopilot: config.autopilot,
            mode,
            fragment_limit: config.fragment_limit(),
            last_errno: 0,
            stats: StatsHandle::default(),
            destroyed: false,
        }
    }

    /// Builds a transport from raw run parameters: `mode` uses the integer
    /// mapping of [`FuzzMode::from_raw`] and `fragment_cap <= 0` disables the cap.
    #[must_use]
    pub fn create(raw: &[u8], autopilot: bool, mode: i32, fragment_cap: i32) -> Self {
        let config = FuzzConfig::new(autopilot, FuzzMode::from_raw(mode), fragment_cap);
        Self::new(Bytes::copy_from_slice(raw), &config)
    }

    #[must_use]
    pub fn into_boxed(self) -> Box<dyn StreamTransport> {
        Box::new(self)
    }

    /// Effective mode after `Dynamic` resolution.
    #[must_use]
    pub fn mode(&self) -> FuzzMode {
        self.mode
    }

    #[must_use]
    pub fn is_autopilot(&self) -> bool {
        self.autopilot
    }

    #[must_use]
    pub fn fragment_limit(&self) -> Option<NonZeroUsize> {
        self.fragment_limit
    }

    #[must_use]
    pub fn stats(&self) -> TransportStats {
        self.stats.get()
    }

    /// Shared handle to the counters, still readable after the transport
    /// has been boxed and destroyed.
    #[must_use]
    pub fn stats_handle(&self) -> StatsHandle {
        self.stats.clone()
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn remaining_input(&self) -> usize {
        self.input.len() - self.cursor
    }

    #[must_use]
    pub fn pending_injected(&self) -> usize {
        self.rx.pending()
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn read_cap(&self, requested: usize) -> usize {
        match self.fragment_limit {
            Some(limit) if limit.get() < requested => limit.get(),
            _ => requested,
        }
    }

    fn would_block(&mut self, cause: WouldBlockCause) -> FuzzError {
        let err = FuzzError::WouldBlock(cause);
        self.last_errno = err.transport_errno();
        self.stats.update(|s| s.failed_reads += 1);
        err
    }
}

impl StreamTransport for FuzzTransport {
    fn connect(&mut self, host: &str, port: u16, _timeout: Duration) -> Result<()> {
        trace!(host, port, "Fuzz transport connect");
        self.connected = true;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        if !self.connected {
            return Err(self.would_block(WouldBlockCause::NotConnected));
        }

        let cap = self.read_cap(buf.len());

        if !self.rx.is_empty() {
            let n = self.rx.dequeue_into(&mut buf[..cap]);
            self.stats.update(|s| s.bytes_from_rx += n);
            trace!(n, pending = self.rx.pending(), "Read injected reply bytes");
            return Ok(n);
        }

        let remaining = self.remaining_input();
        if remaining == 0 {
            return Err(self.would_block(WouldBlockCause::Drained));
        }

        let n = cap.min(remaining);
        buf[..n].copy_from_slice(&self.input[self.cursor..self.cursor + n]);
        self.cursor += n;
        self.stats.update(|s| s.bytes_from_input += n);
        trace!(n, remaining = self.remaining_input(), "Read fuzz input bytes");
        Ok(n)
    }

    fn write(&mut self, buf: &[u8], _timeout: Duration) -> Result<usize> {
        self.stats.update(|s| {
            s.writes += 1;
            s.bytes_written += buf.len();
        });

        if !self.autopilot || buf.is_empty() {
            return Ok(buf.len());
        }

        if let Some(reply) = synthesize(buf, self.mode) {
            if self.rx.enqueue(&reply.bytes) {
                self.stats.update(|s| s.replies += 1);
                debug!(
                    outbound = format_args!("0x{:02X}", buf[0]),
                    reply = %reply.kind,
                    mode = %self.mode,
                    "Autopilot queued reply"
                );
            } else {
                self.stats.update(|s| s.replies_dropped += 1);
            }
        }

        Ok(buf.len())
    }

    // Only raw input counts; queued replies are not reported as readable.
    fn poll_read(&mut self, _timeout: Duration) -> Readiness {
        if self.cursor < self.input.len() {
            Readiness::Readable
        } else {
            Readiness::Failed
        }
    }

    fn close(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }

    fn destroy(&mut self) -> Result<()> {
        if self.destroyed {
            return Ok(());
        }
        self.connected = false;
        self.rx.release();
        self.input = Bytes::new();
        self.cursor = 0;
        self.destroyed = true;
        debug!(stats = ?self.stats.get(), "Fuzz transport destroyed");
        Ok(())
    }

    fn last_errno(&self) -> i32 {
        self.last_errno
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
