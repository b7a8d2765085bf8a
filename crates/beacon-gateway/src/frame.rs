//! Frame adapter
//!
//! Binds raw transport messages to the payload codec: text frames are decoded
//! directly, binary frames are zlib-inflated end-to-end first. Frames are
//! resolved strictly in arrival order.

use crate::error::DecodeError;
use crate::protocol::{codec, GatewayMessage};
use flate2::read::ZlibDecoder;
use std::io::Read;
use tracing::debug;

/// A raw message from the transport layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFrame {
    /// A complete text message
    Text(String),
    /// A complete binary message (zlib-compressed text)
    Binary(Vec<u8>),
}

/// Decodes transport frames into gateway messages
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    /// Emit each raw string at debug level before decoding
    log_received: bool,
}

impl FrameDecoder {
    /// Create a frame decoder
    #[must_use]
    pub fn new(log_received: bool) -> Self {
        Self { log_received }
    }

    /// Decode one transport frame into a gateway message
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::BadFrame` if a binary frame does not inflate to
    /// UTF-8 text, or any codec error for the decoded text.
    pub fn decode(&self, frame: TransportFrame) -> Result<GatewayMessage, DecodeError> {
        let text = match frame {
            TransportFrame::Text(text) => text,
            TransportFrame::Binary(bytes) => inflate(&bytes)?,
        };

        if self.log_received {
            debug!(raw = %text, "gateway frame received");
        }

        codec::decode(&text)
    }
}

/// Inflate a whole zlib-compressed frame into a string
fn inflate(bytes: &[u8]) -> Result<String, DecodeError> {
    let mut decoder = ZlibDecoder::new(bytes);
    let mut text = String::new();
    decoder
        .read_to_string(&mut text)
        .map_err(|e| DecodeError::BadFrame(e.to_string()))?;
    Ok(text)
}
