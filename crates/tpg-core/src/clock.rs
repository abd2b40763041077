//! Simulation clock.
//!
//! The clock is the single source of simulated time. It advances in fixed
//! steps of `tick_hours` from the run's start time and reports when the end
//! time has been reached.
//!
//! # Design Principles
//!
//! - The tick counter and the current time move together; one is never
//!   advanced without the other.
//! - All arithmetic is checked. Overflow is a [`ClockError`], never a wrap.

use chrono::{DateTime, Duration, Utc};

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Tick counter would overflow.
    #[error("tick counter overflow: cannot advance beyond u64::MAX")]
    TickOverflow,

    /// Simulated time would leave chrono's representable range.
    #[error("simulated time overflow after {now}")]
    TimeOverflow {
        /// The last representable time reached.
        now: DateTime<Utc>,
    },

    /// Invalid clock configuration (e.g. a zero-length tick).
    #[error("invalid clock configuration: {reason}")]
    InvalidConfig {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

/// Fixed-step simulation clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimClock {
    /// Number of ticks already run.
    tick: u64,
    /// Simulated time at the start of the next tick.
    now: DateTime<Utc>,
    /// First simulated instant.
    start: DateTime<Utc>,
    /// The run stops once `now` reaches this time.
    end: DateTime<Utc>,
    /// Tick length in whole hours.
    tick_hours: u32,
}

impl SimClock {
    /// Create a clock running from `start` to `end` in steps of
    /// `tick_hours`.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if `tick_hours` is zero or
    /// `end` is before `start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, tick_hours: u32) -> Result<Self, ClockError> {
        if tick_hours == 0 {
            return Err(ClockError::InvalidConfig {
                reason: "tick_hours must be at least 1".to_owned(),
            });
        }
        if end < start {
            return Err(ClockError::InvalidConfig {
                reason: format!("end time {end} is before start time {start}"),
            });
        }
        Ok(Self {
            tick: 0,
            now: start,
            start,
            end,
            tick_hours,
        })
    }

    /// Number of ticks already run.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Simulated time at the start of the current tick.
    pub const fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Simulated time at the end of the current tick.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TimeOverflow`] if the time cannot be
    /// represented.
    pub fn next(&self) -> Result<DateTime<Utc>, ClockError> {
        self.now
            .checked_add_signed(self.step())
            .ok_or(ClockError::TimeOverflow { now: self.now })
    }

    /// First simulated instant.
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Last simulated instant.
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Tick length in whole hours.
    pub const fn tick_hours(&self) -> u32 {
        self.tick_hours
    }

    /// Tick length as a duration.
    pub fn step(&self) -> Duration {
        Duration::hours(i64::from(self.tick_hours))
    }

    /// Whether the run has reached its end time.
    pub fn is_finished(&self) -> bool {
        self.now >= self.end
    }

    /// Number of ticks needed to cover the whole run.
    pub fn total_ticks(&self) -> u64 {
        let span_hours = self.end.signed_duration_since(self.start).num_hours();
        let span = u64::try_from(span_hours).unwrap_or(0);
        span.div_ceil(u64::from(self.tick_hours))
    }

    /// Advance by one tick. Returns the new tick number.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TickOverflow`] or [`ClockError::TimeOverflow`]
    /// if either counter would leave its range.
    pub fn advance(&mut self) -> Result<u64, ClockError> {
        let next = self.next()?;
        self.tick = self.tick.checked_add(1).ok_or(ClockError::TickOverflow)?;
        self.now = next;
        Ok(self.tick)
    }
}
