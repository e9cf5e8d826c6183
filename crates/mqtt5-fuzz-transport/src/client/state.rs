use std::collections::{HashMap, HashSet};

pub const CONNECTED_BIT: u32 = 1 << 0;
pub const DISCONNECTED_BIT: u32 = 1 << 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientState {
    #[default]
    Disconnected,
    Connecting,
    Connected {
        session_present: bool,
    },
}

impl ClientState {
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

/// Where an outbound QoS > 0 publish stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutgoingStage {
    AwaitingPubAck,
    AwaitingPubRec,
    AwaitingPubComp,
}

/// Packet identifiers and acknowledgements of one session.
#[derive(Debug, Default)]
pub struct SessionState {
    next_packet_id: u16,
    pub pending_subscribe: Option<u16>,
    pub outgoing: HashMap<u16, OutgoingStage>,
    pub incoming_qos2: HashSet<u16>,
    pub ping_outstanding: bool,
    pub published: bool,
}

impl SessionState {
    /// Next non-zero packet identifier, wrapping after 65535.
    pub fn next_packet_id(&mut self) -> u16 {
        self.next_packet_id = self.next_packet_id.checked_add(1).unwrap_or(1);
        self.next_packet_id
    }

    pub fn reset(&mut self) {
        self.pending_subscribe = None;
        self.outgoing.clear();
        self.incoming_qos2.clear();
        self.ping_outstanding = false;
        self.published = false;
    }
}
