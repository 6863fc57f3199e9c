//! The logging capability handed to every component that isolates failures.

use crate::error::ActionFailure;

/// Receives failures that were caught and suppressed at an invocation
/// boundary.
///
/// Implementations must not panic: they are called from inside failure
/// guards and from the scheduler's own loop.
pub trait ErrorLog: Send + Sync {
  fn log_error(&self, error: &ActionFailure, message: &str);
}

/// The default `ErrorLog`, forwarding every failure to `tracing` at the
/// `ERROR` level. Install any `tracing` subscriber to collect them.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl ErrorLog for TracingLog {
  fn log_error(&self, error: &ActionFailure, message: &str) {
    tracing::error!(error = %error, "{}", message);
  }
}
