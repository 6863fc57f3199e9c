#![allow(dead_code)]

use fibre_fibers::{ActionFailure, ErrorLog};
use parking_lot::Mutex;
use std::thread;
use std::time::{Duration, Instant};

pub const SHORT_TIMEOUT: Duration = Duration::from_millis(500);
pub const LONG_TIMEOUT: Duration = Duration::from_secs(3);
pub const ITEMS_LOW: usize = 50;
pub const ITEMS_HIGH: usize = 1000;

/// An `ErrorLog` that remembers every failure it is given.
#[derive(Default)]
pub struct RecordingLog {
  entries: Mutex<Vec<(ActionFailure, String)>>,
}

impl RecordingLog {
  pub fn entries(&self) -> Vec<(ActionFailure, String)> {
    self.entries.lock().clone()
  }

  pub fn len(&self) -> usize {
    self.entries.lock().len()
  }
}

impl ErrorLog for RecordingLog {
  fn log_error(&self, error: &ActionFailure, message: &str) {
    self.entries.lock().push((error.clone(), message.to_string()));
  }
}

/// Polls `condition` until it holds or `timeout` elapses.
pub fn wait_until<F: FnMut() -> bool>(timeout: Duration, mut condition: F) -> bool {
  let deadline = Instant::now() + timeout;
  loop {
    if condition() {
      return true;
    }
    if Instant::now() >= deadline {
      return false;
    }
    thread::sleep(Duration::from_millis(2));
  }
}
