use super::Channel;
use crate::error::ChannelError;
use crate::fiber::Fiber;

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

type Consumer<T> = Arc<Mutex<Box<dyn FnMut(T) + Send + 'static>>>;

/// Delivers every message to one consumer callback, executed on a fiber.
///
/// Messages sent from one thread reach the consumer in the order they were
/// sent, each exactly once, and the consumer never runs concurrently with
/// itself.
pub struct ConsumerChannel<T> {
  fiber: Arc<dyn Fiber>,
  consumer: Consumer<T>,
}

impl<T> ConsumerChannel<T> {
  pub fn new<F>(fiber: Arc<dyn Fiber>, consumer: F) -> Self
  where
    F: FnMut(T) + Send + 'static,
  {
    Self {
      fiber,
      consumer: Arc::new(Mutex::new(Box::new(consumer))),
    }
  }
}

impl<T> fmt::Debug for ConsumerChannel<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ConsumerChannel").finish_non_exhaustive()
  }
}

impl<T: Send + 'static> Channel<T> for ConsumerChannel<T> {
  fn send(&self, message: T) -> Result<(), ChannelError> {
    let consumer = self.consumer.clone();
    self.fiber.enqueue(Box::new(move || {
      // Uncontended: the fiber never runs two deliveries at once.
      let mut consumer = consumer.lock();
      (*consumer)(message);
    }))?;
    Ok(())
  }
}
