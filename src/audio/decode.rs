// ABOUTME: The `Decoder` collaborator contract plus a complete PCM pass-through implementation
// ABOUTME: Opus/FLAC decoders are supplied by the host; only PCM needs no codec to be genuine

use crate::audio::AudioFormat;
use crate::error::Error;

/// Decodes one encoded chunk into interleaved little-endian 16-bit PCM
/// bytes, the single "decoded_pcm_bytes" layout the rest of the core (the
/// scheduler and the default `Sink`s) agree on.
///
/// `initialize`/`cleanup` bracket a stream (`stream/start`/`stream/end`);
/// `decode` is called once per binary audio chunk and is subject to the
/// Supervisor's 1-second timeout.
pub trait Decoder: Send {
    fn initialize(&mut self, format: &AudioFormat) -> Result<(), Error>;
    fn decode(&mut self, encoded: &[u8]) -> Result<Vec<u8>, Error>;
    fn cleanup(&mut self);
}

/// Byte order of the PCM samples on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcmEndian {
    Little,
    Big,
}

/// Complete, non-lossy pass-through decoder for the `pcm` codec.
///
/// 16-bit little-endian input is the identity transform (satisfies the
/// round-trip law: decoding a PCM chunk is the identity on bytes). Other
/// combinations are normalized to that same 16-bit little-endian layout so
/// every downstream `Sink` has exactly one format to handle.
#[derive(Debug, Clone)]
pub struct PcmDecoder {
    bit_depth: u8,
    endian: PcmEndian,
}

impl PcmDecoder {
    pub fn new(bit_depth: u8) -> Self {
        Self::with_endian(bit_depth, PcmEndian::Little)
    }

    pub fn with_endian(bit_depth: u8, endian: PcmEndian) -> Self {
        Self { bit_depth, endian }
    }
}

impl Decoder for PcmDecoder {
    fn initialize(&mut self, format: &AudioFormat) -> Result<(), Error> {
        self.bit_depth = format.bit_depth;
        Ok(())
    }

    fn decode(&mut self, encoded: &[u8]) -> Result<Vec<u8>, Error> {
        match self.bit_depth {
            16 => {
                if encoded.len() % 2 != 0 {
                    return Err(Error::DecodeFailure(
                        "16-bit PCM chunk length not a multiple of 2".to_string(),
                    ));
                }
                if self.endian == PcmEndian::Little {
                    Ok(encoded.to_vec())
                } else {
                    Ok(encoded.chunks_exact(2).flat_map(|p| [p[1], p[0]]).collect())
                }
            }
            24 => {
                if encoded.len() % 3 != 0 {
                    return Err(Error::DecodeFailure(
                        "24-bit PCM chunk length not a multiple of 3".to_string(),
                    ));
                }
                Ok(encoded
                    .chunks_exact(3)
                    .flat_map(|triplet| {
                        // Normalize to 16-bit LE by keeping the two most
                        // significant bytes and dropping the precision tail.
                        let (lo_idx, hi_idx) = match self.endian {
                            PcmEndian::Little => (1, 2),
                            PcmEndian::Big => (1, 0),
                        };
                        [triplet[lo_idx], triplet[hi_idx]]
                    })
                    .collect())
            }
            other => Err(Error::DecodeFailure(format!(
                "unsupported PCM bit depth: {other}"
            ))),
        }
    }

    fn cleanup(&mut self) {}
}
