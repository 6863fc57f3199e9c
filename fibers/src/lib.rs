//! Lightweight in-process concurrency built on fibers.
//!
//! - **Fibers** run enqueued actions one at a time, in order, without tying
//!   an OS thread to every logical execution context.
//! - **Channels** add typed, actor-style delivery on top of fibers: a single
//!   consumer, fan-out publish/subscribe, and interval-coalescing variants.
//! - **Schedulers** run one-shot and periodic actions on fibers at precise
//!   future times, multiplexing every pending deadline onto one timer.
//!
//! Failures raised by user callbacks are caught where the callback is
//! invoked, reported through an `ErrorLog`, and never propagate into the
//! scheduler or to sibling subscribers.

pub mod channel;
pub mod clock;
pub mod error;
pub mod fiber;
pub mod log;
pub mod scheduler;

mod guard;

pub use channel::{
  Channel, ConsumerChannel, FnChannel, IntervalChannel, LastIntervalChannel,
  PublishSubscribeChannel,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ActionFailure, ChannelError, FiberError};
pub use fiber::{Action, Fiber, FiberBuilder, InlineFiber, ThreadFiber};
pub use log::{ErrorLog, TracingLog};
pub use scheduler::{
  FiberScheduler, PeriodicAction, ScheduledAction, ScheduledActionList, SchedulerBuilder,
  TimerFiberScheduler,
};
