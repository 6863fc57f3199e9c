use std::any::Any;
use std::io;

use thiserror::Error;

/// Errors raised by a fiber when it cannot accept or run work.
#[derive(Debug, Error)]
pub enum FiberError {
  /// The fiber's worker has shut down and no longer accepts actions.
  #[error("fiber is closed")]
  Closed,
  /// The operating system refused to start the fiber's worker thread.
  #[error("failed to spawn fiber worker: {0}")]
  Spawn(#[from] io::Error),
}

/// Errors returned from `Channel::send`.
///
/// Only lifecycle problems are reported here. A consumer or subscriber that
/// fails while processing a message never surfaces to the sender.
#[derive(Debug, Error)]
pub enum ChannelError {
  /// The fiber backing the channel is closed.
  #[error("channel fiber unavailable: {0}")]
  Fiber(#[from] FiberError),
  /// A channel implementation refused the message.
  #[error("message rejected: {0}")]
  Rejected(String),
}

/// A failure raised by a user-supplied callback, captured at the point
/// where the callback was invoked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionFailure {
  /// The callback panicked. Holds the panic message when it was a string.
  #[error("action panicked: {0}")]
  Panicked(String),
  /// The callback returned an error.
  #[error("action failed: {0}")]
  Failed(String),
}

impl ActionFailure {
  /// Converts a payload obtained from `catch_unwind` into a failure.
  pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
    let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
      (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
      s.clone()
    } else {
      "non-string panic payload".to_string()
    };
    ActionFailure::Panicked(message)
  }
}

impl From<ChannelError> for ActionFailure {
  fn from(err: ChannelError) -> Self {
    ActionFailure::Failed(err.to_string())
  }
}
