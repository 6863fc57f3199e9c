//! Serialized execution contexts.
//!
//! A fiber accepts zero-argument actions and runs them one at a time, in the
//! order they were enqueued, without blocking the caller on submission.
//! Fibers never dedicate an OS thread per logical context to the caller:
//! many channels and schedulers can share one fiber.

mod inline;
mod thread;

pub use inline::InlineFiber;
pub use thread::{FiberBuilder, ThreadFiber};

use crate::error::FiberError;

/// A unit of work accepted by a fiber.
pub type Action = Box<dyn FnOnce() + Send + 'static>;

/// A serialized executor.
///
/// Actions enqueued on the same fiber execute in FIFO order and never
/// concurrently with each other. `enqueue` never waits for the action to
/// run.
pub trait Fiber: Send + Sync {
  /// Schedules `action` to run on this fiber.
  ///
  /// Returns `FiberError::Closed` if the fiber no longer accepts work.
  fn enqueue(&self, action: Action) -> Result<(), FiberError>;
}

impl<F: Fiber + ?Sized> Fiber for std::sync::Arc<F> {
  #[inline]
  fn enqueue(&self, action: Action) -> Result<(), FiberError> {
    (**self).enqueue(action)
  }
}
