// ABOUTME: Jitter-buffered playback scheduler
// ABOUTME: Priority-queues decoded PCM by play instant; buffers at startup; drops late chunks; recovers on stall

use crate::audio::output::Sink;
use crate::sync::now_unix_us;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Fixed per spec: must match the server's chunk duration.
const CHUNK_DURATION_MS: u64 = 20;
/// Absolute value of the late/early release window.
const LATE_WINDOW_US: i64 = 50_000;
const RELEASE_PERIOD: Duration = Duration::from_millis(10);
const WATCHDOG_PERIOD: Duration = Duration::from_secs(1);

const BUFFERING_TIMEOUT_US: i64 = 5_000_000;
const NO_PLAYBACK_AFTER_RECEIVE_TIMEOUT_US: i64 = 3_000_000;
const SYNC_LOST_DROP_THRESHOLD: u32 = 20;
const STUCK_QUEUE_DEPTH: usize = 10;
const STUCK_QUEUE_TIMEOUT_US: i64 = 5_000_000;

/// A decoded chunk waiting for its play instant.
#[derive(Debug, Clone)]
struct ScheduledBuffer {
    play_at_unix_us: i64,
    decoded_pcm_bytes: Arc<[u8]>,
    #[allow(dead_code)]
    original_server_timestamp_us: i64,
}

// Min-heap by play_at_unix_us: reverse the natural Ord so BinaryHeap (a
// max-heap) pops the smallest play instant first.
impl PartialEq for ScheduledBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.play_at_unix_us == other.play_at_unix_us
    }
}
impl Eq for ScheduledBuffer {}
impl PartialOrd for ScheduledBuffer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ScheduledBuffer {
    fn cmp(&self, other: &Self) -> Ordering {
        other.play_at_unix_us.cmp(&self.play_at_unix_us)
    }
}

/// Received/played/dropped counters satisfying
/// `received == played + dropped + queue.len()` at any instant.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    pub received: u64,
    pub played: u64,
    pub dropped: u64,
}

struct Inner {
    heap: BinaryHeap<ScheduledBuffer>,
    buffering: bool,
    buffer_target_chunks: usize,
    max_queue_chunks: usize,
    last_play_unix_us: Option<i64>,
    last_enqueue_unix_us: Option<i64>,
    last_received_unix_us: Option<i64>,
    buffering_since_unix_us: i64,
    stats: SchedulerStats,
    consecutive_drops: u32,
    sink: Arc<dyn Sink>,
}

impl Inner {
    fn recover(&mut self) {
        let discarded = self.heap.len() as u64;
        self.heap.clear();
        self.stats.dropped += discarded;
        self.buffering = true;
        self.buffering_since_unix_us = now_unix_us();
        self.consecutive_drops = 0;
        log::warn!("scheduler recovery: discarded {discarded} buffered chunks, re-entering buffering");
    }
}

/// The jitter-buffered playback scheduler. Codec-agnostic: it accepts
/// already-decoded PCM bytes and an original server timestamp, and knows
/// nothing about how the bytes were produced.
pub struct Scheduler {
    inner: Arc<Mutex<Inner>>,
    running: AtomicBool,
    release_task: Mutex<Option<JoinHandle<()>>>,
    watchdog_task: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// `buffer_ms` is the target jitter-buffer depth in milliseconds of audio.
    pub fn new(buffer_ms: u64, sink: Arc<dyn Sink>) -> Arc<Self> {
        let buffer_target_chunks = std::cmp::max(1, (buffer_ms / CHUNK_DURATION_MS) as usize);
        let max_queue_chunks = std::cmp::min(600, buffer_target_chunks + 50);

        Arc::new(Self {
            inner: Arc::new(Mutex::new(Inner {
                heap: BinaryHeap::new(),
                buffering: true,
                buffer_target_chunks,
                max_queue_chunks,
                last_play_unix_us: None,
                last_enqueue_unix_us: None,
                last_received_unix_us: None,
                buffering_since_unix_us: now_unix_us(),
                stats: SchedulerStats::default(),
                consecutive_drops: 0,
                sink,
            })),
            running: AtomicBool::new(false),
            release_task: Mutex::new(None),
            watchdog_task: Mutex::new(None),
        })
    }

    /// Start the release loop and watchdog background tasks.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, AtomicOrdering::SeqCst) {
            return;
        }

        let release_inner = Arc::clone(&self.inner);
        let release_handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(RELEASE_PERIOD);
            loop {
                ticker.tick().await;
                Self::release_tick(&release_inner);
            }
        });
        *self.release_task.lock().unwrap() = Some(release_handle);

        let watchdog_inner = Arc::clone(&self.inner);
        let watchdog_self = Arc::clone(self);
        let watchdog_handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(WATCHDOG_PERIOD);
            loop {
                ticker.tick().await;
                watchdog_self.watchdog_tick(&watchdog_inner);
            }
        });
        *self.watchdog_task.lock().unwrap() = Some(watchdog_handle);
    }

    /// Stop both background tasks. Idempotent.
    pub fn stop(&self) {
        if !self.running.swap(false, AtomicOrdering::SeqCst) {
            return;
        }
        if let Some(h) = self.release_task.lock().unwrap().take() {
            h.abort();
        }
        if let Some(h) = self.watchdog_task.lock().unwrap().take() {
            h.abort();
        }
    }

    /// Enqueue a decoded PCM buffer with its original server timestamp
    /// already mapped to a local play instant.
    pub fn enqueue(&self, play_at_unix_us: i64, decoded_pcm_bytes: Arc<[u8]>, original_server_timestamp_us: i64) {
        let now = now_unix_us();

        let mut inner = self.inner.lock().unwrap();
        inner.stats.received += 1;
        inner.last_received_unix_us = Some(now);

        if play_at_unix_us - now < -LATE_WINDOW_US {
            inner.stats.dropped += 1;
            inner.consecutive_drops += 1;
            return;
        }

        if inner.heap.len() >= inner.max_queue_chunks {
            inner.stats.dropped += 1;
            return;
        }

        inner.heap.push(ScheduledBuffer {
            play_at_unix_us,
            decoded_pcm_bytes,
            original_server_timestamp_us,
        });
        inner.last_enqueue_unix_us = Some(now);
    }

    fn release_tick(inner: &Arc<Mutex<Inner>>) {
        let mut inner = inner.lock().unwrap();

        if inner.buffering {
            if inner.heap.len() >= inner.buffer_target_chunks {
                inner.buffering = false;
            } else {
                return;
            }
        }

        let now = now_unix_us();
        loop {
            let delta = match inner.heap.peek() {
                Some(top) => top.play_at_unix_us - now,
                None => break,
            };

            if delta > LATE_WINDOW_US {
                break;
            }

            let buffer = inner.heap.pop().unwrap();
            if delta < -LATE_WINDOW_US {
                inner.stats.dropped += 1;
                inner.consecutive_drops += 1;
                continue;
            }

            let sink = Arc::clone(&inner.sink);
            if let Err(e) = sink.play(&buffer.decoded_pcm_bytes) {
                log::warn!("sink play error: {e}");
            }
            inner.stats.played += 1;
            inner.last_play_unix_us = Some(now);
            inner.consecutive_drops = 0;
        }
    }

    fn watchdog_tick(&self, inner: &Arc<Mutex<Inner>>) {
        let now = now_unix_us();
        let mut inner = inner.lock().unwrap();

        let buffering_too_long =
            inner.buffering && now - inner.buffering_since_unix_us > BUFFERING_TIMEOUT_US;

        // Only meaningful once steady-state playback has started; during
        // the initial fill, not-yet-playing is expected, not a stall.
        let received_but_not_playing = !inner.buffering
            && match inner.last_received_unix_us {
                Some(recv) if now - recv < NO_PLAYBACK_AFTER_RECEIVE_TIMEOUT_US => {
                    match inner.last_play_unix_us {
                        Some(play) => now - play > NO_PLAYBACK_AFTER_RECEIVE_TIMEOUT_US,
                        None => true,
                    }
                }
                _ => false,
            };

        let sync_lost_stuck = inner.consecutive_drops > SYNC_LOST_DROP_THRESHOLD as u32;

        let stuck_queue = !inner.buffering
            && inner.heap.len() > STUCK_QUEUE_DEPTH
            && inner
                .last_play_unix_us
                .map(|play| now - play > STUCK_QUEUE_TIMEOUT_US)
                .unwrap_or(true);

        if buffering_too_long {
            log::warn!("watchdog: buffering exceeded {BUFFERING_TIMEOUT_US}us, forcing exit");
            inner.buffering = false;
        }

        if received_but_not_playing || sync_lost_stuck || stuck_queue {
            inner.recover();
        }
    }

    /// Flush the queue and re-enter buffering, for `stream/clear` (seek).
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        let discarded = inner.heap.len() as u64;
        inner.heap.clear();
        inner.stats.dropped += discarded;
        inner.buffering = true;
        inner.buffering_since_unix_us = now_unix_us();
        inner.consecutive_drops = 0;
    }

    pub fn queue_len(&self) -> usize {
        self.inner.lock().unwrap().heap.len()
    }

    pub fn is_buffering(&self) -> bool {
        self.inner.lock().unwrap().buffering
    }

    pub fn stats_snapshot(&self) -> (u64, u64, u64) {
        let inner = self.inner.lock().unwrap();
        (inner.stats.received, inner.stats.played, inner.stats.dropped)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
