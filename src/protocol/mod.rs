// ABOUTME: Protocol codec: frame/unframe the Sendspin wire protocol
// ABOUTME: Text messages are `{type, payload}` JSON; binary frames are typed and length-prefixed

pub mod binary;
pub mod messages;

pub use binary::{binary_types, ArtworkChunk, AudioChunk, BinaryFrame, VisualizerChunk};
pub use messages::Message;

use crate::error::Error;

/// Serialize an outgoing message to its JSON text-frame representation.
pub fn encode_text(message: &Message) -> Result<String, Error> {
    Ok(serde_json::to_string(message)?)
}

/// Parse an incoming text frame into a typed message.
///
/// An unrecognized `type` field surfaces as `Error::UnknownMessageType` so
/// the caller can log and continue without closing the connection.
pub fn decode_text(text: &str) -> Result<Message, Error> {
    serde_json::from_str(text).map_err(|e| {
        if e.is_data() {
            Error::UnknownMessageType(e.to_string())
        } else {
            Error::Protocol(e.to_string())
        }
    })
}

/// Parse an incoming binary frame.
pub fn decode_binary(frame: &[u8]) -> Result<BinaryFrame, Error> {
    BinaryFrame::from_bytes(frame)
}
