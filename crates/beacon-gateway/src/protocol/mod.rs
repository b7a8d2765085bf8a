//! Gateway protocol definitions
//!
//! Op codes, payloads, the wire envelope, the payload codec, and close codes.

mod close_codes;
pub mod codec;
mod messages;
mod opcodes;
mod payloads;

pub use close_codes::CloseCode;
pub use codec::{decode, encode, MAX_OUTBOUND_LEN};
pub use messages::{Envelope, GatewayMessage};
pub use opcodes::OpCode;
pub use payloads::{
    Activity, ActivityType, HelloPayload, IdentifyPayload, IdentifyProperties,
    RequestGuildMembersPayload, ResumePayload, Status, StatusUpdatePayload,
    VoiceStateUpdatePayload,
};
