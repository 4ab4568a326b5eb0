//! Tick-based timeouts

use std::time::{Duration, Instant};

/// Scheduler tick rate
pub const TICK_RATE_HZ: u32 = 1000;

/// Duration of one scheduler tick
pub const TICK_PERIOD: Duration = Duration::from_millis(1000 / TICK_RATE_HZ as u64);

/// How long a blocking operation may wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Timeout {
    /// Return immediately if the operation cannot complete
    NoWait,

    /// Wait up to the given number of ticks
    Ticks(u32),

    /// Wait until the operation completes
    #[default]
    Forever,
}

impl Timeout {
    /// Tick count that means "wait forever"
    pub const MAX_DELAY: u32 = u32::MAX;

    /// Convert a raw tick count, honouring the `0` and `MAX_DELAY` conventions
    pub const fn from_ticks(ticks: u32) -> Self {
        match ticks {
            0 => Timeout::NoWait,
            Self::MAX_DELAY => Timeout::Forever,
            n => Timeout::Ticks(n),
        }
    }

    /// Convert a duration, rounding up to whole ticks
    pub fn from_duration(duration: Duration) -> Self {
        let period = TICK_PERIOD.as_nanos();
        let ticks = duration.as_nanos().div_ceil(period);
        Self::from_ticks(u32::try_from(ticks).unwrap_or(Self::MAX_DELAY))
    }

    /// Wall-clock length of the wait, `None` for [`Timeout::Forever`]
    pub fn as_duration(self) -> Option<Duration> {
        match self {
            Timeout::NoWait => Some(Duration::ZERO),
            Timeout::Ticks(n) => Some(TICK_PERIOD * n),
            Timeout::Forever => None,
        }
    }

    /// Whether the operation may suspend the caller
    pub fn may_block(self) -> bool {
        !matches!(self, Timeout::NoWait | Timeout::Ticks(0))
    }

    /// Absolute deadline measured from now, `None` for [`Timeout::Forever`]
    pub(crate) fn deadline(self) -> Option<Instant> {
        self.as_duration().map(|d| Instant::now() + d)
    }
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        Self::from_duration(duration)
    }
}
