use thiserror::Error;

/// Failures of the identifier generator.
///
/// None of these are retried: a generator that cannot prove monotonicity
/// must refuse to emit an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeneratorError {
    /// The clock reported a time earlier than the last one used.
    #[error("Clock moved backwards: last={last_ms}ms now={now_ms}ms, refusing to generate id")]
    ClockRegression { last_ms: u64, now_ms: u64 },

    /// The clock reported a time earlier than the configured epoch.
    #[error("Clock is before the generator epoch")]
    ClockBeforeEpoch,

    /// Elapsed milliseconds since the epoch no longer fit the timestamp bits.
    #[error("Timestamp exceeds the generator's timestamp bits")]
    TimestampOverflow,

    /// The epoch cannot be expressed as milliseconds since 1970.
    #[error("Invalid generator epoch: {0}")]
    InvalidEpoch(String),
}

#[derive(Debug, Error)]
pub enum AllocationError {
    #[error(transparent)]
    Generator(#[from] GeneratorError),

    /// Every attempt produced a code that was already taken.
    #[error("No free short code found after {attempts} attempts")]
    Exhausted { attempts: u32 },
}
