//! Binds one fuzz input to one client instance and steps it a bounded
//! number of times.

use crate::client::{ClientEvent, ClientOptions, EventHandler, ReferenceClient};
use crate::config::FuzzConfig;
use crate::error::Result;
use crate::mode::FuzzMode;
use crate::transport::fuzz::{FuzzTransport, TransportStats};
use crate::transport::StreamTransport;
use bytes::Bytes;
use serde::Serialize;
use std::ops::AddAssign;
use tracing::{debug, trace};

/// What a single `step()` did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub frames_handled: usize,
    pub packets_sent: usize,
    pub bytes_read: usize,
    pub bytes_written: usize,
    pub errors: usize,
}

impl AddAssign for StepOutcome {
    fn add_assign(&mut self, rhs: Self) {
        self.frames_handled += rhs.frames_handled;
        self.packets_sent += rhs.packets_sent;
        self.bytes_read += rhs.bytes_read;
        self.bytes_written += rhs.bytes_written;
        self.errors += rhs.errors;
    }
}

/// A client that can be driven one iteration at a time.
///
/// The client owns the transport it was built with and must destroy it
/// from [`StepClient::destroy`].
pub trait StepClient {
    /// Runs one iteration of the client's main loop without blocking.
    ///
    /// # Errors
    /// Implementation defined; the driver counts errors and keeps stepping.
    fn step(&mut self) -> Result<StepOutcome>;

    fn register_event_handler(&mut self, handler: EventHandler);

    /// Tears the client down together with its transport.
    ///
    /// # Errors
    /// Returns the transport's destroy error.
    fn destroy(self: Box<Self>) -> Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub input_len: usize,
    pub effective_mode: FuzzMode,
    pub steps: usize,
    pub step_errors: usize,
    pub outcome: StepOutcome,
    pub transport: TransportStats,
}

#[derive(Debug, Clone)]
pub struct RunDriver {
    config: FuzzConfig,
}

impl RunDriver {
    #[must_use]
    pub fn new(config: FuzzConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &FuzzConfig {
        &self.config
    }

    /// Runs `input` through a fresh transport and the client built by
    /// `factory`, which receives the transport and its effective mode.
    ///
    /// # Errors
    /// Returns the factory's error, or the client's destroy error.
    pub fn run_once<F>(&self, input: impl Into<Bytes>, factory: F) -> Result<RunReport>
    where
        F: FnOnce(Box<dyn StreamTransport>, FuzzMode) -> Result<Box<dyn StepClient>>,
    {
        let input = input.into();
        let input_len = input.len();
        let transport = FuzzTransport::new(input, &self.config);
        let effective_mode = transport.mode();
        let stats = transport.stats_handle();

        let mut client = factory(transport.into_boxed(), effective_mode)?;
        client.register_event_handler(Box::new(|_: &ClientEvent| {}));

        let mut report = RunReport {
            input_len,
            effective_mode,
            ..RunReport::default()
        };

        for step in 0..self.config.step_count {
            match client.step() {
                Ok(outcome) => report.outcome += outcome,
                Err(e) => {
                    trace!(step, "Client step failed: {e}");
                    report.step_errors += 1;
                }
            }
            report.steps += 1;
        }

        client.destroy()?;
        report.transport = stats.get();

        debug!(
            input_len,
            mode = %effective_mode,
            frames = report.outcome.frames_handled,
            replies = report.transport.replies,
            "Run finished"
        );
        Ok(report)
    }

    /// Runs `input` against the in-tree [`ReferenceClient`].
    ///
    /// # Errors
    /// See [`RunDriver::run_once`].
    pub fn run_reference(&self, input: impl Into<Bytes>) -> Result<RunReport> {
        self.run_once(input, |transport, mode| {
            let client = ReferenceClient::new(transport, ClientOptions::for_mode(mode));
            Ok(Box::new(client) as Box<dyn StepClient>)
        })
    }
}
