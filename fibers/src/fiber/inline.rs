use super::{Action, Fiber};
use crate::error::FiberError;
use crate::guard;
use crate::log::{ErrorLog, TracingLog};

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A fiber that runs actions on the thread that enqueues them.
///
/// Whichever caller finds the fiber idle becomes the drainer and runs every
/// queued action, including ones enqueued concurrently or re-entrantly from
/// inside a running action. Other callers only append and return. Ordering
/// and mutual exclusion are the same as for `ThreadFiber`, and a
/// single-threaded caller observes all effects before `enqueue` returns,
/// which makes this fiber useful for deterministic tests.
pub struct InlineFiber {
  queue: Mutex<VecDeque<Action>>,
  draining: AtomicBool,
  logger: Arc<dyn ErrorLog>,
}

impl fmt::Debug for InlineFiber {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("InlineFiber")
      .field("pending", &self.queue.lock().len())
      .field("draining", &self.draining.load(Ordering::Relaxed))
      .finish_non_exhaustive()
  }
}

impl Default for InlineFiber {
  fn default() -> Self {
    Self::new()
  }
}

impl InlineFiber {
  pub fn new() -> Self {
    Self::with_logger(Arc::new(TracingLog))
  }

  pub fn with_logger(logger: Arc<dyn ErrorLog>) -> Self {
    Self {
      queue: Mutex::new(VecDeque::new()),
      draining: AtomicBool::new(false),
      logger,
    }
  }

  fn drain(&self) {
    loop {
      if self
        .draining
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
      {
        // Another caller is draining and will pick up our action.
        return;
      }

      loop {
        // The lock must not be held while the action runs.
        let next = self.queue.lock().pop_front();
        match next {
          Some(action) => {
            guard::isolate(&*self.logger, "Unhandled failure in fiber action", || {
              action();
              Ok(())
            });
          }
          None => break,
        }
      }

      self.draining.store(false, Ordering::Release);

      // Something may have been appended between our last pop and the
      // release of the flag.
      if self.queue.lock().is_empty() {
        return;
      }
    }
  }
}

impl Fiber for InlineFiber {
  fn enqueue(&self, action: Action) -> Result<(), FiberError> {
    self.queue.lock().push_back(action);
    self.drain();
    Ok(())
  }
}
