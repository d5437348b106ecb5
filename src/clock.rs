use chrono::{DateTime, Utc};

/// Source of wall-clock time for id generation and expiry checks.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;

    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.now_millis() as i64).unwrap_or_default()
    }
}

/// The operating system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        Utc::now().timestamp_millis().max(0) as u64
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{ManualClock, TickingClock};
    use super::*;

    #[test]
    fn now_matches_millis() {
        let clock = ManualClock::new(1_700_000_000_123);
        assert_eq!(clock.now().timestamp_millis(), 1_700_000_000_123);
    }

    #[test]
    fn ticking_clock_advances_after_reads() {
        let clock = TickingClock::new(100, 2);
        let reads: Vec<u64> = (0..5).map(|_| clock.now_millis()).collect();
        assert_eq!(reads, vec![100, 100, 101, 101, 102]);
    }

    #[test]
    fn system_clock_is_after_2024() {
        assert!(SystemClock.now_millis() > 1_704_067_200_000);
    }
}
