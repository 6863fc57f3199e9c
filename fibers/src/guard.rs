use crate::error::ActionFailure;
use crate::log::ErrorLog;

use std::panic::{self, AssertUnwindSafe};

/// Runs `f`, converting a returned error or a panic into a logged
/// `ActionFailure`. Returns `true` when `f` completed successfully.
///
/// Nothing raised by `f` escapes this call.
pub(crate) fn isolate<F>(logger: &dyn ErrorLog, message: &str, f: F) -> bool
where
  F: FnOnce() -> Result<(), ActionFailure>,
{
  let failure = match panic::catch_unwind(AssertUnwindSafe(f)) {
    Ok(Ok(())) => return true,
    Ok(Err(failure)) => failure,
    Err(payload) => ActionFailure::from_panic(payload),
  };
  logger.log_error(&failure, message);
  false
}
