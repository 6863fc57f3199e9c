use super::action::WeakScheduledAction;
use super::timer::Timer;
use super::{FiberScheduler, PeriodicAction, ScheduledAction, ScheduledActionList};
use crate::clock::{Clock, SystemClock};
use crate::error::ActionFailure;
use crate::fiber::{Action, Fiber};
use crate::guard;
use crate::log::{ErrorLog, TracingLog};

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Stand-in for delays too large to add to an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// Configures a `TimerFiberScheduler`.
pub struct SchedulerBuilder {
  clock: Option<Arc<dyn Clock>>,
  logger: Option<Arc<dyn ErrorLog>>,
}

impl fmt::Debug for SchedulerBuilder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SchedulerBuilder")
      .field("has_clock", &self.clock.is_some())
      .field("has_logger", &self.logger.is_some())
      .finish()
  }
}

impl Default for SchedulerBuilder {
  fn default() -> Self {
    Self::new()
  }
}

impl SchedulerBuilder {
  pub fn new() -> Self {
    Self {
      clock: None,
      logger: None,
    }
  }

  /// Sets the time source used for every due time. Defaults to `SystemClock`.
  pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = Some(clock);
    self
  }

  /// Sets the log receiving failures of scheduled actions.
  /// Defaults to `TracingLog`.
  pub fn logger(mut self, logger: Arc<dyn ErrorLog>) -> Self {
    self.logger = Some(logger);
    self
  }

  /// Builds a scheduler whose bookkeeping runs on `fiber`.
  pub fn build(self, fiber: Arc<dyn Fiber>) -> TimerFiberScheduler {
    TimerFiberScheduler {
      shared: Arc::new(SchedulerShared {
        fiber,
        actions: Mutex::new(ScheduledActionList::new()),
        timer: Mutex::new(None),
        clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        logger: self.logger.unwrap_or_else(|| Arc::new(TracingLog)),
        disabled: AtomicBool::new(false),
      }),
    }
  }
}

struct SchedulerShared {
  /// Serializes every mutation of `actions` and every batch of expired
  /// actions.
  fiber: Arc<dyn Fiber>,
  /// Only locked from work running on `fiber`, or briefly for diagnostics.
  actions: Mutex<ScheduledActionList>,
  /// Guards arm/dispose of the timer. Touched by the fiber, the timer
  /// thread and callers of `disable`.
  timer: Mutex<Option<Timer>>,
  clock: Arc<dyn Clock>,
  logger: Arc<dyn ErrorLog>,
  disabled: AtomicBool,
}

impl SchedulerShared {
  fn scheduled_time(&self, delay: Duration) -> Instant {
    let now = self.clock.now();
    now
      .checked_add(delay)
      .unwrap_or_else(|| now + FAR_FUTURE)
  }

  fn schedule_action(self: &Arc<Self>, action: ScheduledAction) {
    let shared = self.clone();
    let result = self.fiber.enqueue(Box::new(move || {
      shared.actions.lock().add(action);
      shared.schedule_timer();
    }));
    if let Err(e) = result {
      self.logger.log_error(
        &ActionFailure::Failed(e.to_string()),
        "Unable to enqueue scheduled action",
      );
    }
  }

  /// Arms the timer for the earliest pending action. Leaves it idle when
  /// nothing is pending.
  fn schedule_timer(self: &Arc<Self>) {
    let next = {
      let mut actions = self.actions.lock();
      actions.remove_cancelled();
      actions.next_scheduled_action_time()
    };
    let Some(due) = next else {
      return;
    };
    let due_in = due.saturating_duration_since(self.clock.now());

    let mut timer = self.timer.lock();
    if self.disabled.load(Ordering::Acquire) {
      return;
    }
    if timer.is_none() {
      let weak: Weak<SchedulerShared> = Arc::downgrade(self);
      match Timer::spawn(move || {
        if let Some(shared) = weak.upgrade() {
          shared.expire_on_fiber();
        }
      }) {
        Ok(created) => *timer = Some(created),
        Err(e) => {
          self.logger.log_error(
            &ActionFailure::Failed(e.to_string()),
            "Unable to start scheduler timer",
          );
          return;
        }
      }
    }
    if let Some(timer) = timer.as_ref() {
      tracing::trace!(due_in_ms = due_in.as_millis() as u64, "scheduler timer armed");
      timer.arm(due_in);
    }
  }

  /// Moves expired-action execution off the timer thread onto the fiber.
  fn expire_on_fiber(self: &Arc<Self>) {
    let shared = self.clone();
    if let Err(e) = self
      .fiber
      .enqueue(Box::new(move || shared.execute_expired_actions()))
    {
      self.logger.log_error(
        &ActionFailure::Failed(e.to_string()),
        "Unable to enqueue expired action batch",
      );
    }
  }

  fn execute_expired_actions(self: &Arc<Self>) {
    if self.disabled.load(Ordering::Acquire) {
      return;
    }

    loop {
      let expired = self.actions.lock().take_expired_actions(self.clock.now());
      if expired.is_empty() {
        break;
      }
      for action in expired {
        guard::isolate(&*self.logger, "Scheduled action dispatch failed", || {
          action.dispatch(&self.logger)
        });
      }
    }

    self.schedule_timer();
  }

  fn disable(&self) {
    if !self.disabled.swap(true, Ordering::AcqRel) {
      tracing::debug!("fiber scheduler disabled");
    }
    // Stopping the timer never waits for its thread, which may be running
    // user actions when the scheduler's fiber is driven inline.
    let timer = self.timer.lock().take();
    drop(timer);
  }
}

/// A `FiberScheduler` that multiplexes every pending action onto one timer.
///
/// Scheduling requests from any thread are funnelled through the
/// scheduler's fiber, so the pending list has a single writer. When the
/// timer fires, the expired batch is executed on that fiber as well: each
/// expired action is dispatched to its own target fiber, then the timer is
/// re-armed for the next earliest due time. Dropping the scheduler disables
/// it.
pub struct TimerFiberScheduler {
  shared: Arc<SchedulerShared>,
}

impl TimerFiberScheduler {
  /// Creates a scheduler with the system clock and the tracing log.
  pub fn new(fiber: Arc<dyn Fiber>) -> Self {
    SchedulerBuilder::new().build(fiber)
  }

  pub fn builder() -> SchedulerBuilder {
    SchedulerBuilder::new()
  }

  /// Number of live actions waiting to fire.
  pub fn pending_count(&self) -> usize {
    self.shared.actions.lock().pending()
  }

  /// Due time of the next action to fire, if any.
  pub fn next_action_time(&self) -> Option<Instant> {
    self.shared.actions.lock().next_scheduled_action_time()
  }

  pub fn is_disabled(&self) -> bool {
    self.shared.disabled.load(Ordering::Acquire)
  }

  /// Runs the expired-action pass now instead of waiting for the timer.
  /// Useful together with a `ManualClock`.
  pub fn poll(&self) {
    self.shared.expire_on_fiber();
  }
}

impl FiberScheduler for TimerFiberScheduler {
  fn schedule(&self, delay: Duration, fiber: Arc<dyn Fiber>, action: Action) -> ScheduledAction {
    let scheduled = ScheduledAction::once(self.shared.scheduled_time(delay), fiber, action);
    self.shared.schedule_action(scheduled.clone());
    scheduled
  }

  fn schedule_periodic(
    &self,
    delay: Duration,
    period: Duration,
    fiber: Arc<dyn Fiber>,
    mut action: PeriodicAction,
  ) -> ScheduledAction {
    let shared = Arc::downgrade(&self.shared);
    let logger = self.shared.logger.clone();

    let scheduled = ScheduledAction::periodic(
      self.shared.scheduled_time(delay),
      period,
      fiber,
      move |me: WeakScheduledAction| -> PeriodicAction {
        Box::new(move || {
          guard::isolate(&*logger, "Periodic action failed", || {
            action();
            Ok(())
          });

          // Re-arm after the run, whatever its outcome.
          let (Some(me), Some(shared)) = (me.upgrade(), shared.upgrade()) else {
            return;
          };
          if me.is_cancelled() {
            return;
          }
          me.set_scheduled_at(shared.scheduled_time(period));
          shared.schedule_action(me);
        })
      },
    );

    self.shared.schedule_action(scheduled.clone());
    scheduled
  }

  fn schedule_action(&self, action: ScheduledAction) {
    self.shared.schedule_action(action);
  }

  fn disable(&self) {
    self.shared.disable();
  }
}

impl fmt::Debug for TimerFiberScheduler {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let actions = self.shared.actions.lock();
    f.debug_struct("TimerFiberScheduler")
      .field("count", &actions.pending())
      .field("next", &actions.next_scheduled_action_time())
      .field("disabled", &self.is_disabled())
      .finish()
  }
}

impl Drop for TimerFiberScheduler {
  fn drop(&mut self) {
    self.shared.disable();
  }
}
