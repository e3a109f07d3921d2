// ABOUTME: Audio format/codec types shared by the decoder and sink collaborators
// ABOUTME: The scheduler itself stays codec-agnostic; only this module and its callers know PCM layout

pub mod decode;
pub mod output;

use serde::{Deserialize, Serialize};

/// Codec named in a `stream/start` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    Pcm,
    Opus,
    Flac,
}

impl Codec {
    pub fn from_wire_name(name: &str) -> Option<Self> {
        match name {
            "pcm" => Some(Codec::Pcm),
            "opus" => Some(Codec::Opus),
            "flac" => Some(Codec::Flac),
            _ => None,
        }
    }
}

/// Stream format descriptor: created on `stream/start`, cleared on `stream/end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFormat {
    pub codec: Codec,
    pub sample_rate: u32,
    pub channels: u8,
    pub bit_depth: u8,
    pub codec_header: Option<String>,
}

/// Supported formats declared in `client/hello`, highest-quality-first,
/// per spec.md §6.
pub fn supported_pcm_formats() -> Vec<(u32, u8)> {
    vec![
        (192_000, 24),
        (176_400, 24),
        (96_000, 24),
        (88_200, 24),
        (48_000, 16),
        (44_100, 16),
    ]
}
