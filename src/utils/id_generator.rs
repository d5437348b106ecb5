//! Simplified Snowflake identifiers.
//!
//! ```text
//! | timestamp: ms since epoch (41 bits) | sequence (8 bits) |
//! ```
//!
//! Up to 256 identifiers per millisecond from one generator. When a
//! millisecond's sequence is used up the caller spins until the clock moves
//! on. There is no worker/instance component, so two generators sharing an
//! epoch will produce overlapping identifiers; run exactly one per deployment.

use chrono::{DateTime, Utc};
use log::error;
use parking_lot::Mutex;

use crate::clock::{Clock, SystemClock};
use crate::errors::GeneratorError;

pub const SEQUENCE_BITS: u32 = 8;
pub const TIMESTAMP_BITS: u32 = 41;

const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;
const MAX_ELAPSED_MS: u64 = (1 << TIMESTAMP_BITS) - 1;

/// Anything that can hand out unique, increasing 64-bit identifiers.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> Result<u64, GeneratorError>;
}

#[derive(Debug, Default)]
struct SnowflakeState {
    last_timestamp_ms: u64,
    sequence: u64,
}

/// Process-wide identifier generator. Share one instance behind an `Arc`.
#[derive(Debug)]
pub struct Snowflake<C: Clock = SystemClock> {
    clock: C,
    epoch_ms: u64,
    state: Mutex<SnowflakeState>,
}

impl Snowflake<SystemClock> {
    pub fn with_system_clock(epoch: DateTime<Utc>) -> Result<Self, GeneratorError> {
        Self::new(SystemClock, epoch)
    }
}

impl<C: Clock> Snowflake<C> {
    pub fn new(clock: C, epoch: DateTime<Utc>) -> Result<Self, GeneratorError> {
        let epoch_ms = u64::try_from(epoch.timestamp_millis())
            .map_err(|_| GeneratorError::InvalidEpoch(epoch.to_rfc3339()))?;

        Ok(Self {
            clock,
            epoch_ms,
            state: Mutex::new(SnowflakeState::default()),
        })
    }

    pub fn epoch_ms(&self) -> u64 {
        self.epoch_ms
    }

    /// Produce the next identifier.
    ///
    /// Blocks (spinning) only when 256 identifiers have already been issued
    /// in the current millisecond.
    ///
    /// ### Errors
    /// * `GeneratorError::ClockRegression` - the clock went backwards
    /// * `GeneratorError::ClockBeforeEpoch` - the clock is earlier than the epoch
    /// * `GeneratorError::TimestampOverflow` - 41 bits of milliseconds are used up
    pub fn generate(&self) -> Result<u64, GeneratorError> {
        let mut state = self.state.lock();
        let mut now_ms = self.clock.now_millis();

        if now_ms < state.last_timestamp_ms {
            error!(
                "Clock moved backwards by {}ms, refusing to generate id",
                state.last_timestamp_ms - now_ms
            );
            return Err(GeneratorError::ClockRegression {
                last_ms: state.last_timestamp_ms,
                now_ms,
            });
        }

        let sequence = if now_ms == state.last_timestamp_ms {
            let next = (state.sequence + 1) & SEQUENCE_MASK;
            if next == 0 {
                now_ms = self.wait_for_next_millis(state.last_timestamp_ms);
            }
            next
        } else {
            0
        };

        let elapsed_ms = self.elapsed_since_epoch(now_ms)?;

        state.sequence = sequence;
        state.last_timestamp_ms = now_ms;

        Ok((elapsed_ms << SEQUENCE_BITS) | sequence)
    }

    fn wait_for_next_millis(&self, last_timestamp_ms: u64) -> u64 {
        let mut now_ms = self.clock.now_millis();
        while now_ms <= last_timestamp_ms {
            std::hint::spin_loop();
            now_ms = self.clock.now_millis();
        }
        now_ms
    }

    fn elapsed_since_epoch(&self, now_ms: u64) -> Result<u64, GeneratorError> {
        let elapsed_ms = now_ms
            .checked_sub(self.epoch_ms)
            .ok_or(GeneratorError::ClockBeforeEpoch)?;

        if elapsed_ms > MAX_ELAPSED_MS {
            return Err(GeneratorError::TimestampOverflow);
        }

        Ok(elapsed_ms)
    }
}

impl<C: Clock> IdGenerator for Snowflake<C> {
    fn next_id(&self) -> Result<u64, GeneratorError> {
        self.generate()
    }
}

/// Milliseconds since the epoch encoded in `id`.
pub fn timestamp_of(id: u64) -> u64 {
    id >> SEQUENCE_BITS
}

/// Per-millisecond sequence encoded in `id`.
pub fn sequence_of(id: u64) -> u64 {
    id & SEQUENCE_MASK
}

#[cfg(test)]
pub mod testing {
    use std::collections::VecDeque;

    use parking_lot::Mutex;

    use super::IdGenerator;
    use crate::errors::GeneratorError;

    /// Returns a fixed list of identifiers, then counts up from `fallback_start`.
    #[derive(Debug)]
    pub struct ScriptedIds {
        script: Mutex<VecDeque<u64>>,
        fallback: Mutex<u64>,
    }

    impl ScriptedIds {
        pub fn new(script: impl IntoIterator<Item = u64>, fallback_start: u64) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                fallback: Mutex::new(fallback_start),
            }
        }

        /// Every call returns the same identifier.
        pub fn constant(id: u64) -> Self {
            Self::new(std::iter::repeat(id).take(10_000), id)
        }
    }

    impl IdGenerator for ScriptedIds {
        fn next_id(&self) -> Result<u64, GeneratorError> {
            if let Some(id) = self.script.lock().pop_front() {
                return Ok(id);
            }
            let mut next = self.fallback.lock();
            let id = *next;
            *next += 1;
            Ok(id)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use chrono::TimeZone;

    use super::*;
    use crate::clock::testing::{ManualClock, TickingClock};

    const EPOCH_MS: i64 = 1_704_067_200_000;
    const NOW_MS: u64 = 1_704_067_260_000;

    fn epoch() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(EPOCH_MS).unwrap()
    }

    #[test]
    fn test_id_layout() {
        let generator = Snowflake::new(ManualClock::new(NOW_MS), epoch()).unwrap();
        let id = generator.generate().unwrap();

        assert_eq!(timestamp_of(id), NOW_MS - EPOCH_MS as u64);
        assert_eq!(sequence_of(id), 0);
        assert_eq!(id, 60_000 << SEQUENCE_BITS);
    }

    #[test]
    fn test_sequence_increments_within_millisecond() {
        let generator = Snowflake::new(ManualClock::new(NOW_MS), epoch()).unwrap();

        let ids: Vec<u64> = (0..3).map(|_| generator.generate().unwrap()).collect();

        assert_eq!(ids.iter().map(|id| sequence_of(*id)).collect::<Vec<_>>(), [0, 1, 2]);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_sequence_resets_when_millisecond_advances() {
        let clock = Arc::new(ManualClock::new(NOW_MS));
        let generator = Snowflake::new(SharedClock(clock.clone()), epoch()).unwrap();

        generator.generate().unwrap();
        generator.generate().unwrap();
        clock.advance(1);
        let id = generator.generate().unwrap();

        assert_eq!(sequence_of(id), 0);
        assert_eq!(timestamp_of(id), NOW_MS + 1 - EPOCH_MS as u64);
    }

    #[test]
    fn test_exhausted_sequence_waits_for_next_millisecond() {
        // The clock stays on NOW_MS for the first 300 reads.
        let generator = Snowflake::new(TickingClock::new(NOW_MS, 300), epoch()).unwrap();

        let ids: Vec<u64> = (0..257).map(|_| generator.generate().unwrap()).collect();

        let first_ms = NOW_MS - EPOCH_MS as u64;
        assert!(ids[..256].iter().all(|id| timestamp_of(*id) == first_ms));
        assert_eq!(sequence_of(ids[255]), 255);

        let overflow = ids[256];
        assert_eq!(timestamp_of(overflow), first_ms + 1);
        assert_eq!(sequence_of(overflow), 0);

        let unique: HashSet<u64> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len());
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_clock_regression_is_fatal() {
        let clock = Arc::new(ManualClock::new(NOW_MS));
        let generator = Snowflake::new(SharedClock(clock.clone()), epoch()).unwrap();
        generator.generate().unwrap();

        clock.set(NOW_MS - 5);
        let err = generator.generate().unwrap_err();
        assert_eq!(
            err,
            GeneratorError::ClockRegression {
                last_ms: NOW_MS,
                now_ms: NOW_MS - 5
            }
        );

        // Once the clock catches up, generation continues without reuse.
        clock.set(NOW_MS);
        let id = generator.generate().unwrap();
        assert_eq!(sequence_of(id), 1);
    }

    #[test]
    fn test_clock_before_epoch() {
        let generator =
            Snowflake::new(ManualClock::new(EPOCH_MS as u64 - 1), epoch()).unwrap();
        assert_eq!(
            generator.generate().unwrap_err(),
            GeneratorError::ClockBeforeEpoch
        );
    }

    #[test]
    fn test_timestamp_overflow() {
        let clock = ManualClock::new(EPOCH_MS as u64 + MAX_ELAPSED_MS + 1);
        let generator = Snowflake::new(clock, epoch()).unwrap();
        assert_eq!(
            generator.generate().unwrap_err(),
            GeneratorError::TimestampOverflow
        );
    }

    #[test]
    fn test_pre_unix_epoch_is_rejected() {
        let epoch = Utc.with_ymd_and_hms(1960, 1, 1, 0, 0, 0).unwrap();
        let err = Snowflake::new(ManualClock::new(NOW_MS), epoch).unwrap_err();
        assert!(matches!(err, GeneratorError::InvalidEpoch(_)));
    }

    #[test]
    fn test_concurrent_callers_get_unique_ids() {
        let generator = Arc::new(Snowflake::with_system_clock(epoch()).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let generator = generator.clone();
                std::thread::spawn(move || {
                    (0..2_000)
                        .map(|_| generator.generate().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {}", id);
            }
        }
        assert_eq!(seen.len(), 16_000);
    }

    /// Lets a test keep a handle on the clock it gave to the generator.
    struct SharedClock(Arc<ManualClock>);

    impl Clock for SharedClock {
        fn now_millis(&self) -> u64 {
            self.0.now_millis()
        }
    }
}
