use super::Channel;
use crate::error::{ActionFailure, ChannelError};
use crate::fiber::Fiber;
use crate::log::{ErrorLog, TracingLog};
use crate::scheduler::{FiberScheduler, ScheduledAction};

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Forwards the most recent message to `output` once per interval.
///
/// `send` only overwrites the held message. On every tick the held message
/// is forwarded, even when nothing new arrived since the previous tick, so a
/// burst collapses into a fixed-rate stream of latest values. Nothing is
/// forwarded before the first message arrives.
///
/// The periodic tick is cancelled by `dispose`, which also runs on drop.
pub struct LastIntervalChannel<T> {
  fiber: Arc<dyn Fiber>,
  interval: Duration,
  output: Arc<dyn Channel<T>>,
  last: Arc<Mutex<Option<T>>>,
  scheduled: ScheduledAction,
  disposed: AtomicBool,
}

impl<T: Clone + Send + 'static> LastIntervalChannel<T> {
  pub fn new<S>(
    fiber: Arc<dyn Fiber>,
    scheduler: &S,
    interval: Duration,
    output: Arc<dyn Channel<T>>,
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
    output: Arc<dyn Channel<T>>,
    logger: Arc<dyn ErrorLog>,
  ) -> Self
  where
    S: FiberScheduler + ?Sized,
  {
    let last = Arc::new(Mutex::new(None));

    let tick_last = last.clone();
    let tick_output = output.clone();
    let scheduled = scheduler.schedule_periodic(
      interval,
      interval,
      fiber.clone(),
      Box::new(move || {
        let Some(message) = tick_last.lock().clone() else {
          return;
        };
        if let Err(e) = tick_output.send(message) {
          logger.log_error(&ActionFailure::from(e), "Interval output rejected message");
        }
      }),
    );

    Self {
      fiber,
      interval,
      output,
      last,
      scheduled,
      disposed: AtomicBool::new(false),
    }
  }
}

impl<T> LastIntervalChannel<T> {
  pub fn interval(&self) -> Duration {
    self.interval
  }

  pub fn output(&self) -> &Arc<dyn Channel<T>> {
    &self.output
  }

  /// Cancels the periodic tick. Only the first call has an effect; it
  /// returns `true`.
  pub fn dispose(&self) -> bool {
    if self.disposed.swap(true, Ordering::AcqRel) {
      return false;
    }
    self.scheduled.cancel();
    tracing::debug!(
      interval_ms = self.interval.as_millis() as u64,
      "last-interval channel disposed"
    );
    true
  }

  pub fn is_disposed(&self) -> bool {
    self.disposed.load(Ordering::Acquire)
  }
}

impl<T> fmt::Debug for LastIntervalChannel<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("LastIntervalChannel")
      .field("interval", &self.interval)
      .field("disposed", &self.is_disposed())
      .finish_non_exhaustive()
  }
}

impl<T: Send + 'static> Channel<T> for LastIntervalChannel<T> {
  fn send(&self, message: T) -> Result<(), ChannelError> {
    let last = self.last.clone();
    self.fiber.enqueue(Box::new(move || {
      *last.lock() = Some(message);
    }))?;
    Ok(())
  }
}

impl<T> Drop for LastIntervalChannel<T> {
  fn drop(&mut self) {
    self.dispose();
  }
}
