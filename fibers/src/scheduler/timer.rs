use parking_lot::{Condvar, Mutex, MutexGuard};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

struct TimerState {
  deadline: Option<Instant>,
  stopped: bool,
}

struct TimerShared {
  state: Mutex<TimerState>,
  signal: Condvar,
}

/// A single re-armable one-shot timer backed by a dedicated thread.
///
/// Each `arm` replaces the previous deadline. When the deadline passes the
/// callback runs once on the timer thread and the timer goes idle until it
/// is armed again. Dropping the timer stops the thread without waiting for
/// it: a callback already in flight finishes on its own.
pub(crate) struct Timer {
  shared: Arc<TimerShared>,
}

impl Timer {
  pub(crate) fn spawn<F>(on_fire: F) -> io::Result<Self>
  where
    F: Fn() + Send + 'static,
  {
    let shared = Arc::new(TimerShared {
      state: Mutex::new(TimerState {
        deadline: None,
        stopped: false,
      }),
      signal: Condvar::new(),
    });

    let thread_shared = shared.clone();
    thread::Builder::new()
      .name("fibre-timer".to_string())
      .spawn(move || run(&thread_shared, on_fire))?;

    Ok(Self { shared })
  }

  /// Fires the callback once `due_in` has elapsed, replacing any earlier
  /// deadline.
  pub(crate) fn arm(&self, due_in: Duration) {
    let mut state = self.shared.state.lock();
    // A deadline too far out to represent never fires.
    state.deadline = Instant::now().checked_add(due_in);
    self.shared.signal.notify_one();
  }
}

fn run<F: Fn()>(shared: &TimerShared, on_fire: F) {
  let mut state = shared.state.lock();
  loop {
    if state.stopped {
      break;
    }
    let deadline = state.deadline;
    match deadline {
      None => shared.signal.wait(&mut state),
      Some(deadline) if Instant::now() >= deadline => {
        state.deadline = None;
        MutexGuard::unlocked(&mut state, || {
          let _ = panic::catch_unwind(AssertUnwindSafe(&on_fire));
        });
      }
      Some(deadline) => {
        let _ = shared.signal.wait_until(&mut state, deadline);
      }
    }
  }
}

impl Drop for Timer {
  fn drop(&mut self) {
    let mut state = self.shared.state.lock();
    state.stopped = true;
    state.deadline = None;
    self.shared.signal.notify_all();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  #[test]
  fn fires_once_per_arm() {
    let fired = Arc::new(AtomicUsize::new(0));
    let f = fired.clone();
    let timer = Timer::spawn(move || {
      f.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    timer.arm(Duration::from_millis(10));
    thread::sleep(Duration::from_millis(150));
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    timer.arm(Duration::ZERO);
    thread::sleep(Duration::from_millis(150));
    assert_eq!(fired.load(Ordering::SeqCst), 2);
  }

  #[test]
  fn rearming_replaces_the_deadline() {
    let fired = Arc::new(AtomicUsize::new(0));
    let f = fired.clone();
    let timer = Timer::spawn(move || {
      f.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    timer.arm(Duration::from_secs(60));
    timer.arm(Duration::from_millis(5));
    thread::sleep(Duration::from_millis(150));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn dropping_stops_pending_fire() {
    let fired = Arc::new(AtomicUsize::new(0));
    let f = fired.clone();
    let timer = Timer::spawn(move || {
      f.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    timer.arm(Duration::from_millis(50));
    drop(timer);
    thread::sleep(Duration::from_millis(120));
    assert_eq!(fired.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn dropping_does_not_wait_for_a_running_callback() {
    let started = Arc::new(AtomicUsize::new(0));
    let s = started.clone();
    let timer = Timer::spawn(move || {
      s.fetch_add(1, Ordering::SeqCst);
      thread::sleep(Duration::from_millis(400));
    })
    .unwrap();

    timer.arm(Duration::ZERO);
    while started.load(Ordering::SeqCst) == 0 {
      thread::sleep(Duration::from_millis(2));
    }
    let begin = Instant::now();
    drop(timer);
    assert!(begin.elapsed() < Duration::from_millis(200));
  }
}
