use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of wall-clock timestamps in milliseconds.
///
/// Only differences between two readings are meaningful to the timer, but the
/// readings must survive a process restart, so they are anchored to the UNIX
/// epoch rather than a monotonic `Instant`.
pub trait Clock: Send + Sync + 'static {
    fn now_ms(&self) -> u64;
}

/// Production clock backed by `SystemTime`
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Hand-driven clock for tests. Clones share the same instant.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Milliseconds between two readings, clamped at zero if the wall clock went backwards
pub fn elapsed_ms(since: u64, now: u64) -> u64 {
    now.saturating_sub(since)
}

/// Format a duration as `h:mm:ss.cc`, dropping the hour field when it is zero
pub fn format_duration(ms: u64) -> String {
    let centis = (ms % 1000) / 10;
    let total_secs = ms / 1000;
    let secs = total_secs % 60;
    let mins = (total_secs / 60) % 60;
    let hours = total_secs / 3600;

    if hours > 0 {
        format!("{hours}:{mins:02}:{secs:02}.{centis:02}")
    } else {
        format!("{mins}:{secs:02}.{centis:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::new(100);
        let other = clock.clone();

        clock.advance(50);
        assert_eq!(other.now_ms(), 150);

        other.set(10);
        assert_eq!(clock.now_ms(), 10);
    }

    #[test]
    fn test_system_clock_is_past_epoch() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.now_ms() > 1_577_836_800_000);
    }

    #[test]
    fn test_elapsed_ms_clamps_backwards_clock() {
        assert_eq!(elapsed_ms(1000, 2500), 1500);
        assert_eq!(elapsed_ms(2500, 1000), 0);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00.00");
        assert_eq!(format_duration(1_234), "0:01.23");
        assert_eq!(format_duration(61_005), "1:01.00");
        assert_eq!(format_duration(3_723_450), "1:02:03.45");
    }
}
