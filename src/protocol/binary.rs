// ABOUTME: Binary frame kinds and parsing for the Sendspin wire protocol
// ABOUTME: Every binary frame is a 1-byte kind + 8-byte big-endian timestamp + payload

use crate::error::Error;
use std::sync::Arc;

/// Binary message type IDs per the Sendspin protocol.
pub mod binary_types {
    /// Player audio chunk.
    pub const PLAYER_AUDIO: u8 = 0x04;
    /// Artwork channels 0-3.
    pub const ARTWORK_CHANNEL_0: u8 = 0x08;
    pub const ARTWORK_CHANNEL_1: u8 = 0x09;
    pub const ARTWORK_CHANNEL_2: u8 = 0x0A;
    pub const ARTWORK_CHANNEL_3: u8 = 0x0B;
    /// Visualizer FFT data.
    pub const VISUALIZER: u8 = 0x10;

    /// True if `kind` is one of the four artwork channel types.
    pub fn is_artwork(kind: u8) -> bool {
        (ARTWORK_CHANNEL_0..=ARTWORK_CHANNEL_3).contains(&kind)
    }

    /// Channel index (0-3) for an artwork frame kind, if it is one.
    pub fn artwork_channel(kind: u8) -> Option<u8> {
        if is_artwork(kind) {
            Some(kind - ARTWORK_CHANNEL_0)
        } else {
            None
        }
    }
}

const HEADER_LEN: usize = 9;

fn split_header(frame: &[u8], expected_kind: impl Fn(u8) -> bool, what: &str) -> Result<(i64, Arc<[u8]>), Error> {
    if frame.len() < HEADER_LEN {
        return Err(Error::MalformedFrame(format!(
            "{what} frame too short: {} bytes",
            frame.len()
        )));
    }
    if !expected_kind(frame[0]) {
        return Err(Error::MalformedFrame(format!(
            "unexpected {what} frame kind: {}",
            frame[0]
        )));
    }
    let timestamp = i64::from_be_bytes([
        frame[1], frame[2], frame[3], frame[4], frame[5], frame[6], frame[7], frame[8],
    ]);
    Ok((timestamp, Arc::from(&frame[HEADER_LEN..])))
}

/// Player audio chunk: binary kind `0x04`.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Server timestamp, server-loop microseconds.
    pub timestamp: i64,
    /// Encoded audio payload, not yet decoded.
    pub data: Arc<[u8]>,
}

impl AudioChunk {
    pub fn from_bytes(frame: &[u8]) -> Result<Self, Error> {
        let (timestamp, data) =
            split_header(frame, |k| k == binary_types::PLAYER_AUDIO, "audio")?;
        Ok(Self { timestamp, data })
    }
}

/// Artwork chunk: binary kinds `0x08`-`0x0B`, one per channel.
#[derive(Debug, Clone)]
pub struct ArtworkChunk {
    /// Artwork channel, 0-3.
    pub channel: u8,
    /// Server timestamp, server-loop microseconds.
    pub timestamp: i64,
    /// Image bytes; an empty payload means "clear this channel".
    pub data: Arc<[u8]>,
}

impl ArtworkChunk {
    pub fn from_bytes(frame: &[u8]) -> Result<Self, Error> {
        if frame.is_empty() {
            return Err(Error::MalformedFrame("empty artwork frame".to_string()));
        }
        let channel = binary_types::artwork_channel(frame[0]).ok_or_else(|| {
            Error::MalformedFrame(format!("not an artwork frame kind: {}", frame[0]))
        })?;
        let (timestamp, data) = split_header(frame, binary_types::is_artwork, "artwork")?;
        Ok(Self {
            channel,
            timestamp,
            data,
        })
    }

    /// An empty payload clears the channel's current artwork.
    pub fn is_clear(&self) -> bool {
        self.data.is_empty()
    }
}

/// Visualizer data: binary kind `0x10`.
#[derive(Debug, Clone)]
pub struct VisualizerChunk {
    /// Server timestamp, server-loop microseconds.
    pub timestamp: i64,
    /// Opaque visualizer payload (e.g. FFT magnitudes).
    pub data: Arc<[u8]>,
}

impl VisualizerChunk {
    pub fn from_bytes(frame: &[u8]) -> Result<Self, Error> {
        let (timestamp, data) =
            split_header(frame, |k| k == binary_types::VISUALIZER, "visualizer")?;
        Ok(Self { timestamp, data })
    }
}

/// Any binary frame, dispatched by its leading kind byte.
#[derive(Debug, Clone)]
pub enum BinaryFrame {
    Audio(AudioChunk),
    Artwork(ArtworkChunk),
    Visualizer(VisualizerChunk),
    /// A kind we don't recognize (or recognize but haven't negotiated a role
    /// for): the caller should log and discard it, never close the socket.
    Unknown { type_id: u8, data: Arc<[u8]> },
}

impl BinaryFrame {
    pub fn from_bytes(frame: &[u8]) -> Result<Self, Error> {
        let kind = *frame
            .first()
            .ok_or_else(|| Error::MalformedFrame("empty binary frame".to_string()))?;

        match kind {
            binary_types::PLAYER_AUDIO => Ok(BinaryFrame::Audio(AudioChunk::from_bytes(frame)?)),
            k if binary_types::is_artwork(k) => {
                Ok(BinaryFrame::Artwork(ArtworkChunk::from_bytes(frame)?))
            }
            binary_types::VISUALIZER => {
                Ok(BinaryFrame::Visualizer(VisualizerChunk::from_bytes(frame)?))
            }
            other => Ok(BinaryFrame::Unknown {
                type_id: other,
                data: Arc::from(&frame[1..]),
            }),
        }
    }
}
