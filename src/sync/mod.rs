// ABOUTME: Clock synchronization component
// ABOUTME: See clock.rs for the filter itself

mod clock;

pub use clock::{now_unix_us, ClockFilter, SyncQuality};
