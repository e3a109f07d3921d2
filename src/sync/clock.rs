// ABOUTME: Clock synchronization filter: RTT estimation and server-to-wall-clock mapping
// ABOUTME: Everything here is Unix microseconds; no monotonic Instant crosses this boundary

use std::time::{SystemTime, UNIX_EPOCH};

/// Read the current wall clock as Unix microseconds.
///
/// This is the single documented wall-clock reader the rest of the core
/// calls through; local interval timers use `tokio::time`'s monotonic clock
/// instead and never mix the two.
pub fn now_unix_us() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_micros() as i64
}

/// RTT above which a sync sample is discarded outright.
const MAX_ACCEPTED_RTT_US: i64 = 100_000;
/// RTT below which sync quality is `Good` rather than `Degraded`.
const GOOD_RTT_US: i64 = 50_000;
/// How stale `last_sync_at_unix_us` may get before quality drops to `Lost`.
const STALE_AFTER_US: i64 = 5_000_000;
/// How far ahead of "now" to schedule a chunk when sync is lost.
const LOST_SYNC_LEAD_US: i64 = 500_000;
/// If the server-to-unix mapping disagrees with "now" by more than this,
/// treat it as broken rather than trust it.
const SANITY_WINDOW_US: i64 = 3_600_000_000;

/// Clock synchronization quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncQuality {
    /// Last accepted sample had RTT < 50ms.
    Good,
    /// Last accepted sample had 50ms <= RTT < 100ms.
    Degraded,
    /// No sample has ever been accepted, or the last one is stale.
    Lost,
}

/// Maps the server's monotonic loop timeline to local wall-clock Unix
/// microseconds from a stream of (t1, t2, t3, t4) sync samples.
///
/// Invariant: if `samples_accepted() > 0` then the origin is set; while the
/// origin is unset, quality is always `Lost`.
#[derive(Debug)]
pub struct ClockFilter {
    server_loop_origin_unix_us: Option<i64>,
    rtt_us: Option<i64>,
    quality: SyncQuality,
    last_sync_at_unix_us: Option<i64>,
    samples_accepted: u64,
}

impl ClockFilter {
    pub fn new() -> Self {
        Self {
            server_loop_origin_unix_us: None,
            rtt_us: None,
            quality: SyncQuality::Lost,
            last_sync_at_unix_us: None,
            samples_accepted: 0,
        }
    }

    /// Submit one (t1, t2, t3, t4) sync sample.
    ///
    /// `t1`/`t4` are client wall-clock microseconds; `t2`/`t3` are server
    /// monotonic-loop microseconds. Returns the computed RTT, even for a
    /// sample that gets discarded for being too slow.
    pub fn submit_sample(&mut self, t1: i64, t2: i64, t3: i64, t4: i64) -> i64 {
        let rtt = (t4 - t1) - (t3 - t2);
        let now = now_unix_us();

        if rtt > MAX_ACCEPTED_RTT_US {
            log::warn!("discarding sync sample: rtt={rtt}us exceeds {MAX_ACCEPTED_RTT_US}us");
            self.last_sync_at_unix_us = Some(now);
            return rtt;
        }

        self.rtt_us = Some(rtt);
        self.last_sync_at_unix_us = Some(now);

        if self.server_loop_origin_unix_us.is_none() {
            // Anchor once; never overwrite on later samples (see DESIGN.md).
            self.server_loop_origin_unix_us = Some(now - t2);
            self.quality = SyncQuality::Good;
            self.samples_accepted += 1;
            log::info!(
                "clock sync established: origin={}us rtt={rtt}us",
                self.server_loop_origin_unix_us.unwrap()
            );
        } else {
            self.quality = if rtt < GOOD_RTT_US {
                SyncQuality::Good
            } else {
                SyncQuality::Degraded
            };
            self.samples_accepted += 1;
        }

        rtt
    }

    /// Convert a server-loop timestamp to a local wall-clock Unix
    /// microsecond play instant.
    pub fn server_to_unix_us(&self, server_ts: i64) -> i64 {
        let now = now_unix_us();

        if self.quality == SyncQuality::Lost || self.server_loop_origin_unix_us.is_none() {
            return now + LOST_SYNC_LEAD_US;
        }

        let mapped = self.server_loop_origin_unix_us.unwrap() + server_ts;
        if (mapped - now).abs() > SANITY_WINDOW_US {
            log::warn!("server_to_unix_us mapping looks broken (mapped={mapped}, now={now}), using estimate");
            return now + LOST_SYNC_LEAD_US;
        }
        mapped
    }

    /// Downgrade quality to `Lost` if the last accepted sample is stale.
    pub fn tick(&mut self) {
        let now = now_unix_us();
        let stale = match self.last_sync_at_unix_us {
            Some(last) => now - last > STALE_AFTER_US,
            None => true,
        };
        if stale {
            self.quality = SyncQuality::Lost;
        }
    }

    pub fn quality(&self) -> SyncQuality {
        self.quality
    }

    pub fn rtt_us(&self) -> Option<i64> {
        self.rtt_us
    }

    pub fn samples_accepted(&self) -> u64 {
        self.samples_accepted
    }

    pub fn server_loop_origin_unix_us(&self) -> Option<i64> {
        self.server_loop_origin_unix_us
    }

    pub fn last_sync_at_unix_us(&self) -> Option<i64> {
        self.last_sync_at_unix_us
    }
}

impl Default for ClockFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rtt_is_computed_correctly() {
        let mut f = ClockFilter::new();
        // rtt = (t4 - t1) - (t3 - t2) = 50 - 10 = 40
        let rtt = f.submit_sample(1_000_000, 500_000, 500_010, 1_000_050);
        assert_eq!(rtt, 40);
        assert_eq!(f.rtt_us(), Some(40));
    }

    #[test]
    fn first_sample_anchors_origin_and_quality_is_good() {
        let mut f = ClockFilter::new();
        assert_eq!(f.quality(), SyncQuality::Lost);
        f.submit_sample(1_000_000, 500_000, 500_010, 1_000_050);
        assert_eq!(f.samples_accepted(), 1);
        assert!(f.server_loop_origin_unix_us().is_some());
        assert_eq!(f.quality(), SyncQuality::Good);
    }

    #[test]
    fn origin_is_not_overwritten_by_later_samples() {
        let mut f = ClockFilter::new();
        f.submit_sample(1_000_000, 500_000, 500_010, 1_000_050);
        let origin_after_first = f.server_loop_origin_unix_us();

        f.submit_sample(5_000_000, 900_000, 900_010, 5_000_060);
        assert_eq!(f.server_loop_origin_unix_us(), origin_after_first);
    }

    #[test]
    fn rtt_at_100ms_boundary_is_rejected_99999_accepted() {
        let mut f = ClockFilter::new();
        // rtt exactly 100_000 -> rejected
        f.submit_sample(0, 0, 0, 100_000);
        assert_eq!(f.samples_accepted(), 0);
        assert!(f.server_loop_origin_unix_us().is_none());

        // rtt 99_999 -> accepted
        let mut f2 = ClockFilter::new();
        f2.submit_sample(0, 0, 0, 99_999);
        assert_eq!(f2.samples_accepted(), 1);
    }

    #[test]
    fn degraded_quality_above_50ms_rtt() {
        let mut f = ClockFilter::new();
        f.submit_sample(0, 0, 0, 40_000); // good, anchors
        f.submit_sample(1_000_000, 0, 0, 1_075_000); // rtt 75ms, degraded
        assert_eq!(f.quality(), SyncQuality::Degraded);
    }

    #[test]
    fn server_to_unix_us_matches_origin_when_synced() {
        let mut f = ClockFilter::new();
        f.submit_sample(0, 0, 0, 40_000);
        let origin = f.server_loop_origin_unix_us().unwrap();
        assert_eq!(f.server_to_unix_us(0), origin);
    }

    #[test]
    fn lost_sync_returns_estimate_500ms_ahead() {
        let f = ClockFilter::new();
        let now = now_unix_us();
        let play_at = f.server_to_unix_us(123);
        assert!(play_at >= now + 499_000 && play_at <= now + 600_000);
    }

    #[test]
    fn tick_downgrades_stale_sync_to_lost() {
        let mut f = ClockFilter::new();
        f.submit_sample(0, 0, 0, 40_000);
        assert_eq!(f.quality(), SyncQuality::Good);

        // Simulate staleness directly since we can't fast-forward wall time in a unit test.
        f.last_sync_at_unix_us = Some(now_unix_us() - 6_000_000);
        f.tick();
        assert_eq!(f.quality(), SyncQuality::Lost);
    }
}
