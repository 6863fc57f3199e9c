use super::PeriodicAction;
use crate::error::ActionFailure;
use crate::fiber::{Action, Fiber};
use crate::guard;
use crate::log::ErrorLog;

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

struct Inner {
  scheduled_at: Mutex<Instant>,
  period: Option<Duration>,
  fiber: Arc<dyn Fiber>,
  body: Mutex<PeriodicAction>,
  cancelled: AtomicBool,
}

/// A handle to a pending timed invocation.
///
/// Clones refer to the same action. Cancelling through any clone stops
/// every future firing, including one that has already been handed to its
/// fiber but has not started yet.
#[derive(Clone)]
pub struct ScheduledAction {
  inner: Arc<Inner>,
}

/// A non-owning reference a periodic body keeps to its own action.
pub(crate) struct WeakScheduledAction(Weak<Inner>);

impl WeakScheduledAction {
  pub(crate) fn upgrade(&self) -> Option<ScheduledAction> {
    self.0.upgrade().map(|inner| ScheduledAction { inner })
  }
}

impl ScheduledAction {
  /// Creates a one-shot action.
  pub(crate) fn once(scheduled_at: Instant, fiber: Arc<dyn Fiber>, action: Action) -> Self {
    let mut action = Some(action);
    let body: PeriodicAction = Box::new(move || {
      if let Some(action) = action.take() {
        action();
      }
    });
    Self {
      inner: Arc::new(Inner {
        scheduled_at: Mutex::new(scheduled_at),
        period: None,
        fiber,
        body: Mutex::new(body),
        cancelled: AtomicBool::new(false),
      }),
    }
  }

  /// Creates a periodic action whose body needs a handle to the action
  /// itself in order to re-arm.
  pub(crate) fn periodic<F>(
    scheduled_at: Instant,
    period: Duration,
    fiber: Arc<dyn Fiber>,
    make_body: F,
  ) -> Self
  where
    F: FnOnce(WeakScheduledAction) -> PeriodicAction,
  {
    let inner = Arc::new_cyclic(|me| Inner {
      scheduled_at: Mutex::new(scheduled_at),
      period: Some(period),
      fiber,
      body: Mutex::new(make_body(WeakScheduledAction(me.clone()))),
      cancelled: AtomicBool::new(false),
    });
    Self { inner }
  }

  /// The absolute time at which the action is next due.
  pub fn scheduled_at(&self) -> Instant {
    *self.inner.scheduled_at.lock()
  }

  pub(crate) fn set_scheduled_at(&self, at: Instant) {
    *self.inner.scheduled_at.lock() = at;
  }

  /// The repeat period, or `None` for a one-shot action.
  pub fn period(&self) -> Option<Duration> {
    self.inner.period
  }

  /// Marks the action as cancelled.
  ///
  /// Returns `true` if this call performed the cancellation, `false` if the
  /// action was already cancelled. Cancelling an action that has already
  /// fired is harmless.
  pub fn cancel(&self) -> bool {
    !self.inner.cancelled.swap(true, Ordering::AcqRel)
  }

  pub fn is_cancelled(&self) -> bool {
    self.inner.cancelled.load(Ordering::Acquire)
  }

  /// Hands the body to the action's fiber. The cancelled flag is checked
  /// again on the fiber, immediately before the body runs.
  pub(crate) fn dispatch(&self, logger: &Arc<dyn ErrorLog>) -> Result<(), ActionFailure> {
    if self.is_cancelled() {
      return Ok(());
    }

    let inner = self.inner.clone();
    let logger = logger.clone();
    self
      .inner
      .fiber
      .enqueue(Box::new(move || {
        if inner.cancelled.load(Ordering::Acquire) {
          return;
        }
        let mut body = inner.body.lock();
        guard::isolate(&*logger, "Scheduled action failed", || {
          (*body)();
          Ok(())
        });
      }))
      .map_err(|e| ActionFailure::Failed(e.to_string()))
  }

  /// Whether two handles refer to the same action.
  pub fn ptr_eq(&self, other: &ScheduledAction) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }
}

impl fmt::Debug for ScheduledAction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ScheduledAction")
      .field("scheduled_at", &self.scheduled_at())
      .field("period", &self.inner.period)
      .field("cancelled", &self.is_cancelled())
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fiber::InlineFiber;
  use crate::log::TracingLog;

  fn inline() -> Arc<dyn Fiber> {
    Arc::new(InlineFiber::new())
  }

  #[test]
  fn cancel_reports_only_the_first_transition() {
    let action = ScheduledAction::once(Instant::now(), inline(), Box::new(|| {}));
    assert!(!action.is_cancelled());
    assert!(action.cancel());
    assert!(!action.cancel());
    assert!(action.clone().is_cancelled());
  }

  #[test]
  fn one_shot_body_runs_at_most_once() {
    let hits = Arc::new(Mutex::new(0));
    let h = hits.clone();
    let action = ScheduledAction::once(Instant::now(), inline(), Box::new(move || *h.lock() += 1));
    let logger: Arc<dyn ErrorLog> = Arc::new(TracingLog);

    action.dispatch(&logger).unwrap();
    action.dispatch(&logger).unwrap();
    assert_eq!(*hits.lock(), 1);
  }

  #[test]
  fn cancelled_action_is_not_dispatched() {
    let hits = Arc::new(Mutex::new(0));
    let h = hits.clone();
    let action = ScheduledAction::once(Instant::now(), inline(), Box::new(move || *h.lock() += 1));
    action.cancel();
    action.dispatch(&(Arc::new(TracingLog) as Arc<dyn ErrorLog>)).unwrap();
    assert_eq!(*hits.lock(), 0);
  }

  #[test]
  fn periodic_body_can_reach_its_own_handle() {
    let seen = Arc::new(Mutex::new(None));
    let s = seen.clone();
    let action = ScheduledAction::periodic(
      Instant::now(),
      Duration::from_secs(1),
      inline(),
      move |me| -> PeriodicAction {
        Box::new(move || {
          *s.lock() = me.upgrade().and_then(|a| a.period());
        })
      },
    );
    action.dispatch(&(Arc::new(TracingLog) as Arc<dyn ErrorLog>)).unwrap();
    assert_eq!(*seen.lock(), Some(Duration::from_secs(1)));
  }
}
