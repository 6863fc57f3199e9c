use parking_lot::Mutex;
use std::fmt;
use std::time::{Duration, Instant};

/// A source of the current time. Schedulers compute every due time from
/// this, so tests can substitute a `ManualClock`.
pub trait Clock: Send + Sync {
  fn now(&self) -> Instant;
}

/// Reads the monotonic system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
  #[inline]
  fn now(&self) -> Instant {
    Instant::now()
  }
}

/// A clock that only moves when told to.
pub struct ManualClock {
  origin: Instant,
  offset: Mutex<Duration>,
}

impl ManualClock {
  /// Creates a clock frozen at the current system instant.
  pub fn new() -> Self {
    Self {
      origin: Instant::now(),
      offset: Mutex::new(Duration::ZERO),
    }
  }

  /// Moves the clock forward by `by`.
  pub fn advance(&self, by: Duration) {
    *self.offset.lock() += by;
  }

  /// Time elapsed since the clock was created.
  pub fn elapsed(&self) -> Duration {
    *self.offset.lock()
  }
}

impl Default for ManualClock {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Debug for ManualClock {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ManualClock")
      .field("elapsed", &self.elapsed())
      .finish()
  }
}

impl Clock for ManualClock {
  fn now(&self) -> Instant {
    self.origin + *self.offset.lock()
  }
}
