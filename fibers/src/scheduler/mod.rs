//! Timed and periodic execution of actions on fibers.
//!
//! A `FiberScheduler` turns wall-clock time into fiber-enqueued work. The
//! `TimerFiberScheduler` multiplexes any number of pending actions onto a
//! single timer and dispatches each expired action to the fiber it was
//! scheduled for.

mod action;
mod action_list;
mod timer;
mod timer_scheduler;

pub use action::ScheduledAction;
pub use action_list::ScheduledActionList;
pub use timer_scheduler::{SchedulerBuilder, TimerFiberScheduler};

use crate::fiber::{Action, Fiber};

use std::sync::Arc;
use std::time::Duration;

/// The body of a periodic scheduled action. It runs once per firing.
pub type PeriodicAction = Box<dyn FnMut() + Send + 'static>;

/// Schedules actions to run on fibers at future times.
pub trait FiberScheduler: Send + Sync {
  /// Runs `action` once on `fiber` after `delay`.
  fn schedule(&self, delay: Duration, fiber: Arc<dyn Fiber>, action: Action) -> ScheduledAction;

  /// Runs `action` on `fiber` after `delay`, then every `period` until the
  /// returned handle is cancelled or the scheduler is disabled.
  ///
  /// The next firing is computed once the current one has finished, so a
  /// slow action delays its next run instead of overlapping it. A failing
  /// action does not end the series.
  fn schedule_periodic(
    &self,
    delay: Duration,
    period: Duration,
    fiber: Arc<dyn Fiber>,
    action: PeriodicAction,
  ) -> ScheduledAction;

  /// Inserts an existing scheduled action at its current due time.
  fn schedule_action(&self, action: ScheduledAction);

  /// Permanently stops the scheduler's timer. Actions already handed to
  /// their fibers may still run; nothing fires afterwards.
  fn disable(&self);

  /// `schedule` with a delay in milliseconds.
  fn schedule_ms(&self, delay_ms: u64, fiber: Arc<dyn Fiber>, action: Action) -> ScheduledAction {
    self.schedule(Duration::from_millis(delay_ms), fiber, action)
  }

  /// `schedule_periodic` with delay and period in milliseconds.
  fn schedule_periodic_ms(
    &self,
    delay_ms: u64,
    period_ms: u64,
    fiber: Arc<dyn Fiber>,
    action: PeriodicAction,
  ) -> ScheduledAction {
    self.schedule_periodic(
      Duration::from_millis(delay_ms),
      Duration::from_millis(period_ms),
      fiber,
      action,
    )
  }
}
