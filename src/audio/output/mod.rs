// ABOUTME: The `Sink` collaborator contract plus a recording no-op default
// ABOUTME: A real device sink lives behind the `cpal-sink` feature in cpal_output.rs

#[cfg(feature = "cpal-sink")]
pub mod cpal_output;
#[cfg(feature = "cpal-sink")]
pub use cpal_output::CpalSink;

use crate::audio::AudioFormat;
use crate::error::Error;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// The local audio renderer the scheduler releases decoded PCM into.
///
/// `play` is called from the scheduler's release loop; it must not block
/// longer than the spec's 100ms drain wait, or the release loop stalls.
pub trait Sink: Send + Sync {
    fn start(&self, format: &AudioFormat) -> Result<(), Error>;
    fn play(&self, pcm: &[u8]) -> Result<(), Error>;
    fn clear_buffer(&self);
    fn stop(&self);
    fn is_active(&self) -> bool;
}

/// A `Sink` that records what it was asked to do and otherwise does
/// nothing. Used as the default when no device feature is enabled, and
/// throughout the test suite.
#[derive(Default)]
pub struct NullSink {
    active: AtomicBool,
    played_count: AtomicUsize,
    played_bytes: Mutex<Vec<u8>>,
}

impl NullSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn played_count(&self) -> usize {
        self.played_count.load(Ordering::SeqCst)
    }

    pub fn last_played(&self) -> Vec<u8> {
        self.played_bytes.lock().unwrap().clone()
    }
}

impl Sink for NullSink {
    fn start(&self, _format: &AudioFormat) -> Result<(), Error> {
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn play(&self, pcm: &[u8]) -> Result<(), Error> {
        self.played_count.fetch_add(1, Ordering::SeqCst);
        *self.played_bytes.lock().unwrap() = pcm.to_vec();
        Ok(())
    }

    fn clear_buffer(&self) {}

    fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::Codec;

    #[test]
    fn null_sink_records_plays() {
        let sink = NullSink::new();
        let format = AudioFormat {
            codec: Codec::Pcm,
            sample_rate: 48_000,
            channels: 2,
            bit_depth: 16,
            codec_header: None,
        };
        sink.start(&format).unwrap();
        assert!(sink.is_active());
        sink.play(&[1, 2, 3, 4]).unwrap();
        assert_eq!(sink.played_count(), 1);
        assert_eq!(sink.last_played(), vec![1, 2, 3, 4]);
        sink.stop();
        assert!(!sink.is_active());
    }
}
