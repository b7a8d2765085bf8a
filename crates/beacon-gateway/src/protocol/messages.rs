//! Gateway message format
//!
//! Defines the typed message variant used throughout the client and the raw
//! wire envelope it maps to.

use super::{
    HelloPayload, IdentifyPayload, OpCode, RequestGuildMembersPayload, ResumePayload,
    StatusUpdatePayload, VoiceStateUpdatePayload,
};
use crate::events::DispatchEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw gateway envelope
///
/// All messages on the wire follow this format. The `op` field is kept as a
/// raw integer so unknown opcodes survive parsing and can be reported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Operation code
    pub op: u8,

    /// Event type (only for op=0 Dispatch)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,

    /// Sequence number (only for op=0 Dispatch)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,

    /// Payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<Value>,
}

impl Envelope {
    /// Create an envelope with only an opcode and payload
    #[must_use]
    pub fn new(op: OpCode, d: Option<Value>) -> Self {
        Self {
            op: op.as_u8(),
            t: None,
            s: None,
            d,
        }
    }
}

/// A gateway message, tagged by opcode
///
/// Covers everything the client sends or receives on the control plane.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayMessage {
    /// Server greeting carrying the heartbeat cadence (op 10)
    Hello(HelloPayload),
    /// Initial client handshake (op 2)
    Identify(IdentifyPayload),
    /// Session resumption handshake (op 6)
    Resume(ResumePayload),
    /// Liveness probe, either direction; the client sends its last seq (op 1)
    Heartbeat(Option<u64>),
    /// Server acknowledgement of a heartbeat (op 11)
    HeartbeatAck,
    /// Server event carrying a sequence number (op 0)
    Dispatch {
        seq: u64,
        event: DispatchEvent,
    },
    /// Server asks the client to disconnect and resume (op 7)
    Reconnect,
    /// Server declares the session invalid; the flag governs resumability (op 9)
    InvalidSession {
        resumable: bool,
    },
    /// Presence update submitted by the application (op 3)
    StatusUpdate(StatusUpdatePayload),
    /// Guild member request submitted by the application (op 8)
    RequestGuildMembers(RequestGuildMembersPayload),
    /// Voice state update submitted by the application (op 4)
    VoiceStateUpdate(VoiceStateUpdatePayload),
}

impl GatewayMessage {
    /// The opcode of this message
    #[must_use]
    pub fn opcode(&self) -> OpCode {
        match self {
            Self::Hello(_) => OpCode::Hello,
            Self::Identify(_) => OpCode::Identify,
            Self::Resume(_) => OpCode::Resume,
            Self::Heartbeat(_) => OpCode::Heartbeat,
            Self::HeartbeatAck => OpCode::HeartbeatAck,
            Self::Dispatch { .. } => OpCode::Dispatch,
            Self::Reconnect => OpCode::Reconnect,
            Self::InvalidSession { .. } => OpCode::InvalidSession,
            Self::StatusUpdate(_) => OpCode::StatusUpdate,
            Self::RequestGuildMembers(_) => OpCode::RequestGuildMembers,
            Self::VoiceStateUpdate(_) => OpCode::VoiceStateUpdate,
        }
    }

    /// Check whether the client may put this message on the wire
    #[must_use]
    pub fn is_sendable(&self) -> bool {
        self.opcode().is_send()
    }
}

impl std::fmt::Display for GatewayMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dispatch { seq, event } => {
                write!(f, "Dispatch(t={}, s={seq})", event.name())
            }
            other => f.write_str(other.opcode().name()),
        }
    }
}
