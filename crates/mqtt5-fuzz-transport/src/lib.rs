//! In-process MQTT broker emulation for coverage-guided fuzzing of MQTT clients.
//!
//! [`FuzzTransport`] replays fuzzer-supplied bytes as inbound network data and,
//! in autopilot mode, answers CONNECT, SUBSCRIBE, PUBREL and PINGREQ with
//! synthetic acknowledgements so a single input can walk a client through
//! connect, subscribe and QoS 2 flows. [`RunDriver`] binds one input to one
//! client instance and steps it a bounded number of times.

#![warn(clippy::pedantic)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]

pub mod autopilot;
pub mod client;
pub mod config;
pub mod constants;
pub mod driver;
pub mod encoding;
pub mod error;
pub mod mode;
pub mod packet_builder;
pub mod platform;
pub mod rx_buffer;
pub mod seeds;
pub mod transport;

pub use autopilot::{synthesize, ReplyKind, SyntheticReply};
pub use client::{
    ClientEvent, ClientOptions, ClientState, EventHandler, ProtocolVersion, ReferenceClient,
};
pub use config::FuzzConfig;
pub use driver::{RunDriver, RunReport, StepClient, StepOutcome};
pub use error::{FuzzError, Result, WouldBlockCause};
pub use mode::FuzzMode;
pub use packet_builder::RawPacketBuilder;
pub use rx_buffer::InjectedRx;
pub use seeds::{Seed, SeedCorpus};
pub use transport::fuzz::{FuzzTransport, StatsHandle, TransportStats};
pub use transport::{destroy_transport, Readiness, StreamTransport};
