//! Typed channels built on fibers.
//!
//! A channel is only a capability to `send` a message. The variants in this
//! module differ in how and when delivery happens:
//!
//! - `ConsumerChannel` hands each message to a single callback on a fiber.
//! - `PublishSubscribeChannel` fans each message out to a fixed set of
//!   subscriber channels, isolating each subscriber's failure.
//! - `LastIntervalChannel` keeps only the most recent message and forwards
//!   it on every tick of a periodic schedule.
//! - `IntervalChannel` collects every message sent during a tick and
//!   forwards them as one batch.

mod consumer;
mod interval;
mod last_interval;
mod publish_subscribe;

pub use consumer::ConsumerChannel;
pub use interval::IntervalChannel;
pub use last_interval::LastIntervalChannel;
pub use publish_subscribe::PublishSubscribeChannel;

use crate::error::ChannelError;

use std::fmt;
use std::sync::Arc;

/// A typed message sink.
pub trait Channel<T>: Send + Sync {
  /// Delivers `message` according to the channel's policy.
  ///
  /// Errors only describe why the channel could not accept the message.
  /// Failures of whatever eventually processes it are not reported here.
  fn send(&self, message: T) -> Result<(), ChannelError>;
}

impl<T, C: Channel<T> + ?Sized> Channel<T> for Arc<C> {
  #[inline]
  fn send(&self, message: T) -> Result<(), ChannelError> {
    (**self).send(message)
  }
}

/// A channel backed by a closure, invoked synchronously on the sender's
/// thread. Mostly useful as a subscriber or output of another channel.
pub struct FnChannel<F> {
  f: F,
}

impl<F> FnChannel<F> {
  pub fn new(f: F) -> Self {
    Self { f }
  }
}

impl<F> fmt::Debug for FnChannel<F> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("FnChannel").finish_non_exhaustive()
  }
}

impl<T, F> Channel<T> for FnChannel<F>
where
  F: Fn(T) -> Result<(), ChannelError> + Send + Sync,
{
  fn send(&self, message: T) -> Result<(), ChannelError> {
    (self.f)(message)
  }
}
