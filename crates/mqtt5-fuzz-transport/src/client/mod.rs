//! Minimal MQTT client that drives a [`StreamTransport`] one step at a time.
//!
//! It connects, subscribes to one filter, publishes one QoS 2 message and
//! answers every inbound acknowledgement flow, which is enough to pull the
//! autopilot through each reply it can synthesize.

pub mod frame;
pub mod state;

pub use frame::{BodyReader, FrameReader, FrameView};
pub use state::{ClientState, OutgoingStage, SessionState, CONNECTED_BIT, DISCONNECTED_BIT};

use crate::constants::{
    CONNACK, DISCONNECT, PINGRESP, PUBACK, PUBCOMP, PUBLISH, PUBREC, PUBREL, READ_SCRATCH_LEN,
    SUBACK, UNSUBACK,
};
use crate::driver::{StepClient, StepOutcome};
use crate::error::{FuzzError, Result};
use crate::mode::FuzzMode;
use crate::packet_builder::{RawPacketBuilder, PROTOCOL_LEVEL_V311, PROTOCOL_LEVEL_V5};
use crate::platform::{EventGroup, Platform};
use crate::transport::StreamTransport;
use bytes::Bytes;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolVersion {
    #[default]
    V311,
    V5,
}

impl ProtocolVersion {
    #[must_use]
    pub fn level(self) -> u8 {
        match self {
            Self::V311 => PROTOCOL_LEVEL_V311,
            Self::V5 => PROTOCOL_LEVEL_V5,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    BeforeConnect,
    Connected { session_present: bool },
    Disconnected,
    Subscribed { packet_id: u16, return_codes: Vec<u8> },
    Published { packet_id: u16 },
    Data { topic: String, payload: Bytes, qos: u8 },
    Error(FuzzError),
}

pub type EventHandler = Box<dyn FnMut(&ClientEvent)>;

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Generated from the platform when unset.
    pub client_id: Option<String>,
    pub protocol_version: ProtocolVersion,
    pub host: String,
    pub port: u16,
    pub network_timeout: Duration,
    pub keepalive_secs: u16,
    /// Send PINGREQ after this many idle ticks; `None` disables keep-alive.
    pub keepalive_ticks: Option<u64>,
    pub subscribe_topic: Option<String>,
    pub subscribe_qos: u8,
    pub publish_topic: Option<String>,
    pub publish_payload: Bytes,
    pub auto_reconnect: bool,
    pub max_frame_len: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            client_id: None,
            protocol_version: ProtocolVersion::V311,
            host: "fuzz.invalid".to_string(),
            port: 1883,
            network_timeout: Duration::ZERO,
            keepalive_secs: 60,
            keepalive_ticks: None,
            subscribe_topic: Some("fuzz/#".to_string()),
            subscribe_qos: 1,
            publish_topic: Some("fuzz/out".to_string()),
            publish_payload: Bytes::from_static(b"fuzz"),
            auto_reconnect: true,
            max_frame_len: frame::DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl ClientOptions {
    /// Defaults for a transport running in `mode`: MQTT 5 framing for `Mqtt5`,
    /// v3.1.1 otherwise.
    #[must_use]
    pub fn for_mode(mode: FuzzMode) -> Self {
        let protocol_version = if mode.is_v5() {
            ProtocolVersion::V5
        } else {
            ProtocolVersion::V311
        };
        Self::default().with_protocol_version(protocol_version)
    }

    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    #[must_use]
    pub fn with_protocol_version(mut self, protocol_version: ProtocolVersion) -> Self {
        self.protocol_version = protocol_version;
        self
    }

    #[must_use]
    pub fn with_keepalive_ticks(mut self, ticks: Option<u64>) -> Self {
        self.keepalive_ticks = ticks;
        self
    }

    #[must_use]
    pub fn with_subscription(mut self, topic: Option<String>, qos: u8) -> Self {
        self.subscribe_topic = topic;
        self.subscribe_qos = qos;
        self
    }

    #[must_use]
    pub fn with_publish(mut self, topic: Option<String>, payload: impl Into<Bytes>) -> Self {
        self.publish_topic = topic;
        self.publish_payload = payload.into();
        self
    }

    #[must_use]
    pub fn with_auto_reconnect(mut self, auto_reconnect: bool) -> Self {
        self.auto_reconnect = auto_reconnect;
        self
    }
}

pub struct ReferenceClient {
    transport: Option<Box<dyn StreamTransport>>,
    options: ClientOptions,
    client_id: String,
    state: ClientState,
    session: SessionState,
    reader: FrameReader,
    scratch: Vec<u8>,
    status: EventGroup,
    platform: Platform,
    handler: Option<EventHandler>,
    connect_attempts: usize,
    last_write_tick: u64,
}

impl std::fmt::Debug for ReferenceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceClient")
            .field("client_id", &self.client_id)
            .field("state", &self.state)
            .field("session", &self.session)
            .field("buffered", &self.reader.buffered())
            .field("has_transport", &self.transport.is_some())
            .finish_non_exhaustive()
    }
}

impl ReferenceClient {
    #[must_use]
    pub fn new(transport: Box<dyn StreamTransport>, options: ClientOptions) -> Self {
        Self::with_platform(transport, options, Platform::default())
    }

    #[must_use]
    pub fn with_platform(
        transport: Box<dyn StreamTransport>,
        options: ClientOptions,
        mut platform: Platform,
    ) -> Self {
        let client_id = options
            .client_id
            .clone()
            .unwrap_or_else(|| platform.create_id_string());
        let status = EventGroup::new();
        status.set_bits(DISCONNECTED_BIT);

        Self {
            transport: Some(transport),
            reader: FrameReader::new(options.max_frame_len),
            options,
            client_id,
            state: ClientState::Disconnected,
            session: SessionState::default(),
            scratch: vec![0u8; READ_SCRATCH_LEN],
            status,
            platform,
            handler: None,
            connect_attempts: 0,
            last_write_tick: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> ClientState {
        self.state
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn status_bits(&self) -> u32 {
        self.status.get_bits()
    }

    #[must_use]
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    #[must_use]
    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts
    }

    pub fn register_event_handler(&mut self, handler: impl FnMut(&ClientEvent) + 'static) {
        self.handler = Some(Box::new(handler));
    }

    /// Runs one connect/read/dispatch/keep-alive cycle.
    ///
    /// The client is single-threaded; `&mut self` serializes API calls, so no
    /// [`ApiLock`](crate::platform::ApiLock) is taken here.
    ///
    /// # Errors
    /// Returns `NotConnected` once the client has been destroyed. Protocol
    /// failures are reported as events and end the session instead.
    pub fn step(&mut self) -> Result<StepOutcome> {
        if self.transport.is_none() {
            return Err(FuzzError::NotConnected);
        }

        let now = self.platform.tick_ms();
        let mut outcome = StepOutcome::default();

        if let Err(err) = self.run_cycle(now, &mut outcome) {
            self.abort(err, &mut outcome);
        }
        Ok(outcome)
    }

    /// Closes and destroys the transport. Later calls are no-ops.
    ///
    /// # Errors
    /// Propagates the transport's destroy error.
    pub fn destroy(&mut self) -> Result<()> {
        let Some(mut transport) = self.transport.take() else {
            return Ok(());
        };
        if let Err(e) = transport.close() {
            warn!("Transport close failed during destroy: {e}");
        }
        self.set_state(ClientState::Disconnected);
        transport.destroy()
    }

    fn run_cycle(&mut self, now: u64, outcome: &mut StepOutcome) -> Result<()> {
        if self.state == ClientState::Disconnected {
            if self.connect_attempts > 0 && !self.options.auto_reconnect {
                return Ok(());
            }
            self.start_session(outcome)?;
        }

        self.read_inbound(outcome)?;
        while let Some(frame) = self.reader.next_frame()? {
            outcome.frames_handled += 1;
            self.dispatch(&frame, outcome)?;
            if self.state == ClientState::Disconnected {
                break;
            }
        }

        self.keepalive(now, outcome)
    }

    fn start_session(&mut self, outcome: &mut StepOutcome) -> Result<()> {
        self.emit(&ClientEvent::BeforeConnect);
        let timeout = self.options.network_timeout;
        self.transport
            .as_mut()
            .ok_or(FuzzError::NotConnected)?
            .connect(&self.options.host, self.options.port, timeout)?;

        self.connect_attempts += 1;
        self.reader.clear();
        self.session.reset();
        self.set_state(ClientState::Connecting);

        let connect = RawPacketBuilder::connect_with_keepalive(
            &self.client_id,
            self.options.protocol_version.level(),
            self.options.keepalive_secs,
        )?;
        self.send(&connect, outcome)
    }

    fn read_inbound(&mut self, outcome: &mut StepOutcome) -> Result<()> {
        let timeout = self.options.network_timeout;
        let transport = self
            .transport
            .as_mut()
            .ok_or(FuzzError::NotConnected)?;

        match transport.read(&mut self.scratch, timeout) {
            Ok(0) => Ok(()),
            Ok(n) => {
                outcome.bytes_read += n;
                self.reader.extend(&self.scratch[..n]);
                Ok(())
            }
            Err(e) if e.is_transient() => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn dispatch(&mut self, frame: &[u8], outcome: &mut StepOutcome) -> Result<()> {
        let view = FrameView::parse(frame)?;
        let v5 = self.options.protocol_version == ProtocolVersion::V5;

        match view.packet_type() {
            CONNACK => self.handle_connack(view.body, v5, outcome),
            SUBACK => self.handle_suback(view.body, v5, outcome),
            PUBLISH => self.handle_publish(view, v5, outcome),
            PUBACK => {
                let packet_id = BodyReader::new(view.body).u16("PUBACK packet id")?;
                self.complete_outgoing(packet_id, OutgoingStage::AwaitingPubAck);
                Ok(())
            }
            PUBREC => {
                let packet_id = BodyReader::new(view.body).u16("PUBREC packet id")?;
                if self.session.outgoing.get(&packet_id) == Some(&OutgoingStage::AwaitingPubRec) {
                    self.session
                        .outgoing
                        .insert(packet_id, OutgoingStage::AwaitingPubComp);
                } else {
                    debug!(packet_id, "PUBREC for unknown packet id");
                }
                self.send(&RawPacketBuilder::pubrel(packet_id), outcome)
            }
            PUBREL => {
                let packet_id = BodyReader::new(view.body).u16("PUBREL packet id")?;
                self.session.incoming_qos2.remove(&packet_id);
                self.send(&RawPacketBuilder::pubcomp(packet_id), outcome)
            }
            PUBCOMP => {
                let packet_id = BodyReader::new(view.body).u16("PUBCOMP packet id")?;
                self.complete_outgoing(packet_id, OutgoingStage::AwaitingPubComp);
                Ok(())
            }
            PINGRESP => {
                self.session.ping_outstanding = false;
                Ok(())
            }
            UNSUBACK => {
                debug!("Ignoring UNSUBACK");
                Ok(())
            }
            DISCONNECT => Err(FuzzError::ProtocolError(
                "server sent DISCONNECT".to_string(),
            )),
            other => Err(FuzzError::ProtocolError(format!(
                "unexpected packet type 0x{other:02X} from server"
            ))),
        }
    }

    fn handle_connack(&mut self, body: &[u8], v5: bool, outcome: &mut StepOutcome) -> Result<()> {
        if self.state != ClientState::Connecting {
            return Err(FuzzError::ProtocolError(
                "CONNACK outside of connect".to_string(),
            ));
        }

        let mut reader = BodyReader::new(body);
        let flags = reader.u8("CONNACK flags")?;
        let return_code = reader.u8("CONNACK return code")?;
        if v5 {
            reader.skip_properties()?;
        }
        if return_code != 0 {
            return Err(FuzzError::ConnectionRefused(return_code));
        }

        let session_present = flags & 0x01 != 0;
        self.set_state(ClientState::Connected { session_present });
        self.emit(&ClientEvent::Connected { session_present });

        if let Some(topic) = self.options.subscribe_topic.clone() {
            let packet_id = self.session.next_packet_id();
            self.session.pending_subscribe = Some(packet_id);
            let qos = self.options.subscribe_qos;
            let packet = if v5 {
                RawPacketBuilder::subscribe_v5(&topic, qos, packet_id)?
            } else {
                RawPacketBuilder::subscribe(&topic, qos, packet_id)?
            };
            self.send(&packet, outcome)?;
        }
        Ok(())
    }

    fn handle_suback(&mut self, body: &[u8], v5: bool, outcome: &mut StepOutcome) -> Result<()> {
        self.require_connected("SUBACK")?;

        let mut reader = BodyReader::new(body);
        let packet_id = reader.u16("SUBACK packet id")?;
        if v5 {
            reader.skip_properties()?;
        }
        let return_codes = reader.rest().to_vec();

        if self.session.pending_subscribe != Some(packet_id) {
            debug!(packet_id, "SUBACK for unknown packet id");
            return Ok(());
        }
        self.session.pending_subscribe = None;
        self.emit(&ClientEvent::Subscribed {
            packet_id,
            return_codes,
        });

        if self.session.published {
            return Ok(());
        }
        if let Some(topic) = self.options.publish_topic.clone() {
            let packet_id = self.session.next_packet_id();
            let payload = self.options.publish_payload.clone();
            let packet = if v5 {
                RawPacketBuilder::publish_v5(0x04, &topic, &payload, Some(packet_id))?
            } else {
                RawPacketBuilder::publish_qos2(&topic, &payload, packet_id)?
            };
            self.session
                .outgoing
                .insert(packet_id, OutgoingStage::AwaitingPubRec);
            self.session.published = true;
            self.send(&packet, outcome)?;
        }
        Ok(())
    }

    fn handle_publish(&mut self, view: FrameView<'_>, v5: bool, outcome: &mut StepOutcome) -> Result<()> {
        self.require_connected("PUBLISH")?;

        let qos = (view.flags() >> 1) & 0x03;
        if qos == 3 {
            return Err(FuzzError::MalformedPacket("PUBLISH with QoS 3".to_string()));
        }

        let mut reader = BodyReader::new(view.body);
        let topic = reader.string("PUBLISH topic")?;
        let packet_id = if qos > 0 {
            Some(reader.u16("PUBLISH packet id")?)
        } else {
            None
        };
        if v5 {
            reader.skip_properties()?;
        }
        let payload = Bytes::copy_from_slice(reader.rest());

        match (qos, packet_id) {
            (1, Some(id)) => self.send(&RawPacketBuilder::puback(id), outcome)?,
            (2, Some(id)) => {
                self.session.incoming_qos2.insert(id);
                self.send(&RawPacketBuilder::pubrec(id), outcome)?;
            }
            _ => {}
        }

        self.emit(&ClientEvent::Data {
            topic,
            payload,
            qos,
        });
        Ok(())
    }

    fn keepalive(&mut self, now: u64, outcome: &mut StepOutcome) -> Result<()> {
        let Some(interval) = self.options.keepalive_ticks else {
            return Ok(());
        };
        if !self.state.is_connected() || now.saturating_sub(self.last_write_tick) < interval {
            return Ok(());
        }
        if self.session.ping_outstanding {
            return Err(FuzzError::ProtocolError("no PINGRESP within keep-alive".to_string()));
        }
        self.session.ping_outstanding = true;
        self.send(&RawPacketBuilder::pingreq(), outcome)
    }

    fn complete_outgoing(&mut self, packet_id: u16, expected: OutgoingStage) {
        if self.session.outgoing.get(&packet_id) == Some(&expected) {
            self.session.outgoing.remove(&packet_id);
            self.emit(&ClientEvent::Published { packet_id });
        } else {
            debug!(packet_id, ?expected, "Acknowledgement for unknown packet id");
        }
    }

    fn send(&mut self, packet: &[u8], outcome: &mut StepOutcome) -> Result<()> {
        let timeout = self.options.network_timeout;
        let written = self.transport_mut()?.write(packet, timeout)?;
        if written != packet.len() {
            return Err(FuzzError::Io(format!(
                "short write: {written} of {} bytes",
                packet.len()
            )));
        }
        self.last_write_tick = self.platform.now_ms();
        outcome.packets_sent += 1;
        outcome.bytes_written += written;
        Ok(())
    }

    fn abort(&mut self, err: FuzzError, outcome: &mut StepOutcome) {
        warn!(client_id = %self.client_id, "Session aborted: {err}");
        outcome.errors += 1;
        self.emit(&ClientEvent::Error(err));

        if let Some(transport) = self.transport.as_mut() {
            if let Err(e) = transport.close() {
                warn!("Transport close failed: {e}");
            }
        }
        self.reader.clear();
        self.session.reset();
        if self.state != ClientState::Disconnected {
            self.set_state(ClientState::Disconnected);
            self.emit(&ClientEvent::Disconnected);
        }
    }

    fn require_connected(&self, packet: &str) -> Result<()> {
        if self.state.is_connected() {
            Ok(())
        } else {
            Err(FuzzError::ProtocolError(format!(
                "{packet} received before CONNACK"
            )))
        }
    }

    fn set_state(&mut self, state: ClientState) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "Client state transition");
        }
        self.state = state;
        if state.is_connected() {
            self.status.clear_bits(DISCONNECTED_BIT);
            self.status.set_bits(CONNECTED_BIT);
        } else {
            self.status.clear_bits(CONNECTED_BIT);
            self.status.set_bits(DISCONNECTED_BIT);
        }
    }

    fn transport_mut(&mut self) -> Result<&mut Box<dyn StreamTransport>> {
        self.transport.as_mut().ok_or(FuzzError::NotConnected)
    }

    fn emit(&mut self, event: &ClientEvent) {
        if let Some(handler) = self.handler.as_mut() {
            handler(event);
        }
    }
}

impl StepClient for ReferenceClient {
    fn step(&mut self) -> Result<StepOutcome> {
        ReferenceClient::step(self)
    }

    fn register_event_handler(&mut self, handler: EventHandler) {
        self.handler = Some(handler);
    }

    fn destroy(mut self: Box<Self>) -> Result<()> {
        ReferenceClient::destroy(&mut self)
    }
}

impl Drop for ReferenceClient {
    fn drop(&mut self) {
        if let Err(e) = ReferenceClient::destroy(self) {
            warn!("Transport destroy failed on drop: {e}");
        }
    }
}
