use super::{Action, Fiber};
use crate::error::FiberError;
use crate::guard;
use crate::log::{ErrorLog, TracingLog};

use fibre::mpsc;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Configures and spawns a `ThreadFiber`.
pub struct FiberBuilder {
  name: Option<String>,
  logger: Option<Arc<dyn ErrorLog>>,
}

impl fmt::Debug for FiberBuilder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("FiberBuilder")
      .field("name", &self.name)
      .field("has_logger", &self.logger.is_some())
      .finish()
  }
}

impl Default for FiberBuilder {
  fn default() -> Self {
    Self::new()
  }
}

impl FiberBuilder {
  pub fn new() -> Self {
    Self {
      name: None,
      logger: None,
    }
  }

  /// Names the worker thread. Defaults to `fibre-fiber`.
  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  /// Sets the log that receives panics escaping enqueued actions.
  /// Defaults to `TracingLog`.
  pub fn logger(mut self, logger: Arc<dyn ErrorLog>) -> Self {
    self.logger = Some(logger);
    self
  }

  /// Starts the worker thread and returns the fiber.
  pub fn spawn(self) -> Result<ThreadFiber, FiberError> {
    let name = self.name.unwrap_or_else(|| "fibre-fiber".to_string());
    let logger = self.logger.unwrap_or_else(|| Arc::new(TracingLog));
    let (tx, rx) = mpsc::unbounded::<Action>();

    let worker = thread::Builder::new().name(name.clone()).spawn(move || {
      tracing::debug!(fiber = %thread_name(), "fiber worker started");
      // Pending actions are drained before `recv` reports the disconnect.
      while let Ok(action) = rx.recv() {
        guard::isolate(&*logger, "Unhandled failure in fiber action", || {
          action();
          Ok(())
        });
      }
      tracing::debug!(fiber = %thread_name(), "fiber worker stopped");
    })?;

    Ok(ThreadFiber {
      name,
      sender: tx,
      worker: Mutex::new(Some(worker)),
    })
  }
}

fn thread_name() -> String {
  thread::current().name().unwrap_or("<unnamed>").to_string()
}

/// A fiber backed by one dedicated worker thread draining an unbounded queue.
///
/// Dropping the fiber closes its queue. Actions already enqueued still run,
/// then the worker exits.
pub struct ThreadFiber {
  name: String,
  sender: mpsc::UnboundedSender<Action>,
  worker: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for ThreadFiber {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ThreadFiber")
      .field("name", &self.name)
      .field("pending", &self.sender.len())
      .finish_non_exhaustive()
  }
}

impl ThreadFiber {
  /// Spawns a fiber with the default configuration.
  pub fn new() -> Result<Self, FiberError> {
    FiberBuilder::new().spawn()
  }

  pub fn builder() -> FiberBuilder {
    FiberBuilder::new()
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Approximate number of actions waiting to run.
  pub fn pending(&self) -> usize {
    self.sender.len()
  }

  /// Stops accepting new actions. Already queued actions still run.
  /// Calling this more than once has no further effect.
  pub fn shutdown(&self) {
    if self.sender.close().is_ok() {
      tracing::debug!(fiber = %self.name, "fiber shutdown requested");
    }
  }

  /// Shuts the fiber down and waits for the worker to drain its queue.
  ///
  /// When called from an action running on this fiber the wait is skipped,
  /// since the worker cannot finish while it is executing the caller.
  pub fn shutdown_and_wait(&self) {
    self.shutdown();
    let handle = self.worker.lock().take();
    if let Some(handle) = handle {
      if handle.thread().id() != thread::current().id() {
        let _ = handle.join();
      }
    }
  }
}

impl Fiber for ThreadFiber {
  fn enqueue(&self, action: Action) -> Result<(), FiberError> {
    self.sender.send(action).map_err(|_| FiberError::Closed)
  }
}

impl Drop for ThreadFiber {
  fn drop(&mut self) {
    self.shutdown();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::time::{Duration, Instant};

  fn wait_for(count: &AtomicUsize, expected: usize) {
    let deadline = Instant::now() + Duration::from_secs(3);
    while count.load(Ordering::SeqCst) < expected && Instant::now() < deadline {
      thread::sleep(Duration::from_millis(1));
    }
  }

  #[test]
  fn actions_run_in_submission_order() {
    let fiber = ThreadFiber::new().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    for i in 0..100 {
      let seen = seen.clone();
      fiber.enqueue(Box::new(move || seen.lock().push(i))).unwrap();
    }
    fiber.shutdown_and_wait();

    assert_eq!(*seen.lock(), (0..100).collect::<Vec<_>>());
  }

  #[test]
  fn worker_survives_a_panicking_action() {
    let fiber = ThreadFiber::builder().name("panicky").spawn().unwrap();
    let count = Arc::new(AtomicUsize::new(0));

    fiber.enqueue(Box::new(|| panic!("first action fails"))).unwrap();
    let c = count.clone();
    fiber
      .enqueue(Box::new(move || {
        c.fetch_add(1, Ordering::SeqCst);
      }))
      .unwrap();

    wait_for(&count, 1);
    assert_eq!(count.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn enqueue_after_shutdown_is_rejected() {
    let fiber = ThreadFiber::new().unwrap();
    fiber.shutdown();
    fiber.shutdown();
    let result = fiber.enqueue(Box::new(|| {}));
    assert!(matches!(result, Err(FiberError::Closed)));
  }

  #[test]
  fn worker_runs_on_named_thread() {
    let fiber = ThreadFiber::builder().name("named-worker").spawn().unwrap();
    let observed = Arc::new(Mutex::new(None));
    let o = observed.clone();
    fiber
      .enqueue(Box::new(move || {
        *o.lock() = thread::current().name().map(str::to_string);
      }))
      .unwrap();
    fiber.shutdown_and_wait();

    assert_eq!(observed.lock().as_deref(), Some("named-worker"));
    assert_eq!(fiber.name(), "named-worker");
  }
}
