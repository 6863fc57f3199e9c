mod common;
use common::*;

use fibre_fibers::{
  Channel, ChannelError, Fiber, FiberScheduler, FnChannel, InlineFiber, IntervalChannel,
  LastIntervalChannel, ManualClock, ThreadFiber, TimerFiberScheduler,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// Long enough that the real timer never fires while a manual-clock test runs.
const INTERVAL: Duration = Duration::from_secs(60);

fn collector<T: Send + 'static>() -> (Arc<Mutex<Vec<T>>>, Arc<dyn Channel<T>>) {
  let seen = Arc::new(Mutex::new(Vec::new()));
  let s = seen.clone();
  let channel: Arc<dyn Channel<T>> =
    Arc::new(FnChannel::new(move |m: T| -> Result<(), ChannelError> {
      s.lock().push(m);
      Ok(())
    }));
  (seen, channel)
}

struct Manual {
  clock: Arc<ManualClock>,
  fiber: Arc<dyn Fiber>,
  scheduler: TimerFiberScheduler,
}

impl Manual {
  fn new() -> Self {
    let clock = Arc::new(ManualClock::new());
    let fiber: Arc<dyn Fiber> = Arc::new(InlineFiber::new());
    let scheduler = TimerFiberScheduler::builder()
      .clock(clock.clone())
      .build(fiber.clone());
    Self {
      clock,
      fiber,
      scheduler,
    }
  }

  fn tick(&self) {
    self.clock.advance(INTERVAL);
    self.scheduler.poll();
  }
}

#[test]
fn burst_collapses_to_latest_value() {
  let m = Manual::new();
  let (seen, output) = collector::<&'static str>();
  let channel = LastIntervalChannel::new(m.fiber.clone(), &m.scheduler, INTERVAL, output);
  assert_eq!(channel.interval(), INTERVAL);

  channel.send("m1").unwrap();
  channel.send("m2").unwrap();
  channel.send("m3").unwrap();
  assert!(seen.lock().is_empty());

  m.tick();
  assert_eq!(*seen.lock(), vec!["m3"]);
}

#[test]
fn quiet_interval_redelivers_previous_value() {
  let m = Manual::new();
  let (seen, output) = collector::<u32>();
  let channel = LastIntervalChannel::new(m.fiber.clone(), &m.scheduler, INTERVAL, output);

  channel.send(1).unwrap();
  m.tick();
  m.tick();
  channel.send(2).unwrap();
  m.tick();

  assert_eq!(*seen.lock(), vec![1, 1, 2]);
}

#[test]
fn nothing_is_delivered_before_the_first_message() {
  let m = Manual::new();
  let (seen, output) = collector::<u32>();
  let _channel = LastIntervalChannel::new(m.fiber.clone(), &m.scheduler, INTERVAL, output);

  m.tick();
  m.tick();
  assert!(seen.lock().is_empty());
}

#[test]
fn dispose_is_idempotent_and_stops_ticks() {
  let m = Manual::new();
  let (seen, output) = collector::<u32>();
  let channel = LastIntervalChannel::new(m.fiber.clone(), &m.scheduler, INTERVAL, output);

  channel.send(5).unwrap();
  m.tick();
  assert_eq!(m.scheduler.pending_count(), 1);

  assert!(channel.dispose());
  assert!(!channel.dispose());
  assert!(channel.is_disposed());
  assert_eq!(m.scheduler.pending_count(), 0);

  m.tick();
  assert_eq!(*seen.lock(), vec![5]);
}

#[test]
fn dropping_the_channel_cancels_its_schedule() {
  let m = Manual::new();
  let (seen, output) = collector::<u32>();
  {
    let channel = LastIntervalChannel::new(m.fiber.clone(), &m.scheduler, INTERVAL, output);
    channel.send(9).unwrap();
  }

  m.tick();
  assert!(seen.lock().is_empty());
  assert_eq!(m.scheduler.pending_count(), 0);
}

#[test]
fn interval_channel_delivers_batches_and_skips_empty_ticks() {
  let m = Manual::new();
  let (seen, output) = collector::<Vec<u32>>();
  let channel = IntervalChannel::new(m.fiber.clone(), &m.scheduler, INTERVAL, output);

  channel.send(1).unwrap();
  channel.send(2).unwrap();
  channel.send(3).unwrap();
  m.tick();
  m.tick();
  channel.send(4).unwrap();
  m.tick();

  assert_eq!(*seen.lock(), vec![vec![1, 2, 3], vec![4]]);

  assert!(channel.dispose());
  assert!(!channel.dispose());
}

#[test]
fn last_interval_on_real_timer() {
  let fiber: Arc<dyn Fiber> = Arc::new(ThreadFiber::new().unwrap());
  let scheduler = TimerFiberScheduler::new(fiber.clone());
  let (seen, output) = collector::<usize>();
  let channel = LastIntervalChannel::new(
    fiber.clone(),
    &scheduler,
    Duration::from_millis(50),
    output,
  );

  for i in 0..ITEMS_HIGH {
    channel.send(i).unwrap();
  }

  assert!(wait_until(LONG_TIMEOUT, || !seen.lock().is_empty()));
  channel.dispose();
  thread::sleep(Duration::from_millis(120));

  let seen = seen.lock();
  assert!(seen.len() < ITEMS_HIGH / 10, "deliveries must be coalesced");
  assert_eq!(*seen.last().unwrap(), ITEMS_HIGH - 1);
  scheduler.disable();
}
