//! Gateway error types

use crate::protocol::CloseCode;
use thiserror::Error;

/// Errors produced while decoding inbound gateway frames
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Frame was not a valid JSON envelope
    #[error("invalid JSON envelope: {0}")]
    BadJson(String),

    /// Opcode outside the protocol set
    #[error("unknown opcode: {0}")]
    UnknownOp(u8),

    /// Dispatch envelope missing its event name, sequence, or data
    #[error("malformed dispatch envelope: {0}")]
    BadDispatch(&'static str),

    /// Binary frame could not be inflated into UTF-8 text
    #[error("bad compressed frame: {0}")]
    BadFrame(String),
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadJson(err.to_string())
    }
}

/// Errors produced while encoding outbound gateway frames
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// Serialized frame would exceed the 4096-byte outbound limit
    #[error("encoded payload is {0} bytes, limit is 4096")]
    TooLarge(usize),

    /// Payload failed a send-time precondition
    #[error("invalid outbound payload: {0}")]
    InvalidPayload(&'static str),

    /// Serialization failed
    #[error("serialization failed: {0}")]
    Json(String),
}

impl From<serde_json::Error> for EncodeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Session-level error type
///
/// Everything that can terminate a gateway session abnormally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Inbound frame could not be decoded
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Outbound message could not be encoded
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// The server missed a heartbeat acknowledgement round trip
    #[error("missed heartbeat acknowledgement")]
    LivenessTimeout,

    /// The session was torn down without an orderly close
    #[error("session terminated abruptly")]
    AbruptTermination,

    /// The server closed the connection with a gateway close code
    #[error("gateway closed the connection: {0}")]
    Closed(CloseCode),

    /// Error propagated from the WebSocket layer
    #[error("transport error: {0}")]
    Transport(String),
}
