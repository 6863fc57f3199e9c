use super::Channel;
use crate::error::{ActionFailure, ChannelError};
use crate::fiber::Fiber;
use crate::log::{ErrorLog, TracingLog};
use crate::scheduler::{FiberScheduler, ScheduledAction};

use parking_lot::Mutex;
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Collects every message sent during an interval and forwards them to
/// `output` as one batch, in send order. Ticks with no messages forward
/// nothing.
///
/// Shares the disposal contract of `LastIntervalChannel`.
pub struct IntervalChannel<T> {
  fiber: Arc<dyn Fiber>,
  interval: Duration,
  output: Arc<dyn Channel<Vec<T>>>,
  pending: Arc<Mutex<Vec<T>>>,
  scheduled: ScheduledAction,
  disposed: AtomicBool,
}

impl<T: Send + 'static> IntervalChannel<T> {
  pub fn new<S>(
    fiber: Arc<dyn Fiber>,
    scheduler: &S,
    interval: Duration,
    output: Arc<dyn Channel<Vec<T>>>,
  ) -> Self
  where
    S: FiberScheduler + ?Sized,
  {
    Self::with_logger(fiber, scheduler, interval, output, Arc::new(TracingLog))
  }

  pub fn with_logger<S>(
    fiber: Arc<dyn Fiber>,
    scheduler: &S,
    interval: Duration,
    output: Arc<dyn Channel<Vec<T>>>,
    logger: Arc<dyn ErrorLog>,
  ) -> Self
  where
    S: FiberScheduler + ?Sized,
  {
    let pending = Arc::new(Mutex::new(Vec::new()));

    let tick_pending = pending.clone();
    let tick_output = output.clone();
    let scheduled = scheduler.schedule_periodic(
      interval,
      interval,
      fiber.clone(),
      Box::new(move || {
        let batch = mem::take(&mut *tick_pending.lock());
        if batch.is_empty() {
          return;
        }
        if let Err(e) = tick_output.send(batch) {
          logger.log_error(&ActionFailure::from(e), "Interval output rejected batch");
        }
      }),
    );

    Self {
      fiber,
      interval,
      output,
      pending,
      scheduled,
      disposed: AtomicBool::new(false),
    }
  }
}

impl<T> IntervalChannel<T> {
  pub fn interval(&self) -> Duration {
    self.interval
  }

  pub fn output(&self) -> &Arc<dyn Channel<Vec<T>>> {
    &self.output
  }

  /// Cancels the periodic tick. Messages still buffered are dropped.
  /// Only the first call has an effect; it returns `true`.
  pub fn dispose(&self) -> bool {
    if self.disposed.swap(true, Ordering::AcqRel) {
      return false;
    }
    self.scheduled.cancel();
    tracing::debug!(interval_ms = self.interval.as_millis() as u64, "interval channel disposed");
    true
  }

  pub fn is_disposed(&self) -> bool {
    self.disposed.load(Ordering::Acquire)
  }
}

impl<T> fmt::Debug for IntervalChannel<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("IntervalChannel")
      .field("interval", &self.interval)
      .field("disposed", &self.is_disposed())
      .finish_non_exhaustive()
  }
}

impl<T: Send + 'static> Channel<T> for IntervalChannel<T> {
  fn send(&self, message: T) -> Result<(), ChannelError> {
    let pending = self.pending.clone();
    self.fiber.enqueue(Box::new(move || {
      pending.lock().push(message);
    }))?;
    Ok(())
  }
}

impl<T> Drop for IntervalChannel<T> {
  fn drop(&mut self) {
    self.dispose();
  }
}
