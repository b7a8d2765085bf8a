//! Payload codec
//!
//! Pure functions translating between typed gateway messages and wire text.

use super::{Envelope, GatewayMessage, HelloPayload, OpCode};
use crate::error::{DecodeError, EncodeError};
use crate::events::DispatchEvent;
use serde_json::Value;

/// Maximum UTF-8 byte length of an outbound frame
///
/// The gateway drops connections that send anything at or past this size;
/// failing locally turns a silent disconnect into a diagnosable error.
pub const MAX_OUTBOUND_LEN: usize = 4096;

/// Serialize a client message to wire text
///
/// # Errors
///
/// Returns `EncodeError::InvalidPayload` for messages the client may not
/// send (including status updates whose activities fail the can-send check)
/// and `EncodeError::TooLarge` when the encoded frame reaches the outbound
/// size limit.
pub fn encode(message: &GatewayMessage) -> Result<String, EncodeError> {
    let envelope = match message {
        GatewayMessage::Heartbeat(seq) => Envelope::new(
            OpCode::Heartbeat,
            Some(seq.map_or(Value::Null, Into::into)),
        ),
        GatewayMessage::Identify(payload) => {
            Envelope::new(OpCode::Identify, Some(serde_json::to_value(payload)?))
        }
        GatewayMessage::Resume(payload) => {
            Envelope::new(OpCode::Resume, Some(serde_json::to_value(payload)?))
        }
        GatewayMessage::StatusUpdate(payload) => {
            if payload.activities.iter().any(|a| !a.can_send()) {
                return Err(EncodeError::InvalidPayload(
                    "status update contains an activity the client may not send",
                ));
            }
            Envelope::new(OpCode::StatusUpdate, Some(serde_json::to_value(payload)?))
        }
        GatewayMessage::RequestGuildMembers(payload) => Envelope::new(
            OpCode::RequestGuildMembers,
            Some(serde_json::to_value(payload)?),
        ),
        GatewayMessage::VoiceStateUpdate(payload) => Envelope::new(
            OpCode::VoiceStateUpdate,
            Some(serde_json::to_value(payload)?),
        ),
        _ => {
            return Err(EncodeError::InvalidPayload(
                "message is not client-sendable",
            ))
        }
    };

    let text = serde_json::to_string(&envelope)?;
    if text.len() >= MAX_OUTBOUND_LEN {
        return Err(EncodeError::TooLarge(text.len()));
    }
    Ok(text)
}

/// Parse wire text into a typed gateway message
///
/// # Errors
///
/// Returns `DecodeError::BadJson` for unparseable text,
/// `DecodeError::UnknownOp` for opcodes outside the protocol set, and
/// `DecodeError::BadDispatch` for dispatch envelopes missing their event
/// name, sequence, or data.
pub fn decode(text: &str) -> Result<GatewayMessage, DecodeError> {
    let envelope: Envelope = serde_json::from_str(text)?;
    let op = OpCode::from_u8(envelope.op).ok_or(DecodeError::UnknownOp(envelope.op))?;

    match op {
        OpCode::Dispatch => {
            let event_type = envelope
                .t
                .ok_or(DecodeError::BadDispatch("missing event name"))?;
            let seq = envelope
                .s
                .ok_or(DecodeError::BadDispatch("missing sequence number"))?;
            let data = envelope
                .d
                .ok_or(DecodeError::BadDispatch("missing event data"))?;
            Ok(GatewayMessage::Dispatch {
                seq,
                event: DispatchEvent::from_parts(&event_type, data),
            })
        }
        OpCode::Heartbeat => Ok(GatewayMessage::Heartbeat(
            envelope.d.as_ref().and_then(Value::as_u64),
        )),
        OpCode::HeartbeatAck => Ok(GatewayMessage::HeartbeatAck),
        OpCode::Reconnect => Ok(GatewayMessage::Reconnect),
        OpCode::InvalidSession => Ok(GatewayMessage::InvalidSession {
            resumable: envelope.d.as_ref().and_then(Value::as_bool).unwrap_or(false),
        }),
        OpCode::Hello => {
            let payload: HelloPayload =
                serde_json::from_value(envelope.d.unwrap_or(Value::Null))?;
            Ok(GatewayMessage::Hello(payload))
        }
        OpCode::Identify => Ok(GatewayMessage::Identify(serde_json::from_value(
            envelope.d.unwrap_or(Value::Null),
        )?)),
        OpCode::Resume => Ok(GatewayMessage::Resume(serde_json::from_value(
            envelope.d.unwrap_or(Value::Null),
        )?)),
        OpCode::StatusUpdate => Ok(GatewayMessage::StatusUpdate(serde_json::from_value(
            envelope.d.unwrap_or(Value::Null),
        )?)),
        OpCode::RequestGuildMembers => Ok(GatewayMessage::RequestGuildMembers(
            serde_json::from_value(envelope.d.unwrap_or(Value::Null))?,
        )),
        OpCode::VoiceStateUpdate => Ok(GatewayMessage::VoiceStateUpdate(
            serde_json::from_value(envelope.d.unwrap_or(Value::Null))?,
        )),
    }
}
