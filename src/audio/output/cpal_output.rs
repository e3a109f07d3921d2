// ABOUTME: cpal-based audio output implementation (feature = "cpal-sink")
// ABOUTME: Cross-platform audio output; owns its cpal::Stream on a dedicated thread since Stream is !Send

use super::Sink;
use crate::audio::AudioFormat;
use crate::error::Error;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, Sender, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;

enum Control {
    Start(AudioFormat),
    Play(Arc<[u8]>),
    ClearBuffer,
    Stop,
}

/// A `Sink` that renders decoded 16-bit LE PCM to the default output device
/// via `cpal`. All cpal state (`Device`, `Stream`) lives on a dedicated OS
/// thread, because `cpal::Stream` is not `Send`; `CpalSink` itself is just a
/// channel handle and is safe to share across the scheduler's async tasks.
pub struct CpalSink {
    control_tx: Sender<Control>,
    active: Arc<AtomicBool>,
    _thread: JoinHandle<()>,
}

impl CpalSink {
    pub fn new() -> Self {
        let (control_tx, control_rx) = std::sync::mpsc::channel();
        let active = Arc::new(AtomicBool::new(false));
        let thread_active = Arc::clone(&active);

        let thread = std::thread::Builder::new()
            .name("sendspin-cpal-sink".to_string())
            .spawn(move || cpal_thread(control_rx, thread_active))
            .expect("failed to spawn cpal sink thread");

        Self {
            control_tx,
            active,
            _thread: thread,
        }
    }
}

impl Default for CpalSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for CpalSink {
    fn start(&self, format: &AudioFormat) -> Result<(), Error> {
        self.control_tx
            .send(Control::Start(format.clone()))
            .map_err(|_| Error::Output("cpal sink thread gone".to_string()))
    }

    fn play(&self, pcm: &[u8]) -> Result<(), Error> {
        self.control_tx
            .send(Control::Play(Arc::from(pcm)))
            .map_err(|_| Error::Output("cpal sink thread gone".to_string()))
    }

    fn clear_buffer(&self) {
        let _ = self.control_tx.send(Control::ClearBuffer);
    }

    fn stop(&self) {
        let _ = self.control_tx.send(Control::Stop);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

fn cpal_thread(control_rx: Receiver<Control>, active: Arc<AtomicBool>) {
    let mut stream: Option<(cpal::Stream, SyncSender<Arc<[u8]>>)> = None;

    while let Ok(msg) = control_rx.recv() {
        match msg {
            Control::Start(format) => match build_stream(&format) {
                Ok((s, tx)) => {
                    if let Err(e) = s.play() {
                        log::error!("failed to start cpal stream: {e}");
                    } else {
                        active.store(true, Ordering::SeqCst);
                    }
                    stream = Some((s, tx));
                }
                Err(e) => log::error!("failed to build cpal stream: {e}"),
            },
            Control::Play(pcm) => {
                if let Some((_, tx)) = &stream {
                    let _ = tx.try_send(pcm);
                }
            }
            Control::ClearBuffer => {
                // Draining the bounded channel is enough; new samples replace
                // whatever was still queued for playback.
                if let Some((_, tx)) = &stream {
                    while tx.try_send(Arc::from(&[][..])).is_ok() {}
                }
            }
            Control::Stop => {
                stream = None;
                active.store(false, Ordering::SeqCst);
            }
        }
    }
}

fn build_stream(format: &AudioFormat) -> Result<(cpal::Stream, SyncSender<Arc<[u8]>>), Error> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Output("no output device available".to_string()))?;

    let config = StreamConfig {
        channels: format.channels as u16,
        sample_rate: SampleRate(format.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    // Bounded to ~10 chunks (200ms at 20ms chunks) for backpressure.
    let (sample_tx, sample_rx) = sync_channel::<Arc<[u8]>>(10);

    let mut current: Option<Arc<[u8]>> = None;
    let mut pos = 0usize;

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                for out in data.iter_mut() {
                    if current.is_none() || pos + 1 >= current.as_ref().unwrap().len() {
                        if let Ok(buf) = sample_rx.try_recv() {
                            current = Some(buf);
                            pos = 0;
                        }
                    }
                    *out = match &current {
                        Some(buf) if pos + 1 < buf.len() => {
                            let sample = i16::from_le_bytes([buf[pos], buf[pos + 1]]);
                            pos += 2;
                            sample
                        }
                        _ => 0,
                    };
                }
            },
            |err| log::error!("cpal stream error: {err}"),
            None,
        )
        .map_err(|e| Error::Output(e.to_string()))?;

    Ok((stream, sample_tx))
}
