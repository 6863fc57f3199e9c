use super::Channel;
use crate::error::{ActionFailure, ChannelError};
use crate::fiber::Fiber;
use crate::guard;
use crate::log::{ErrorLog, TracingLog};

use std::fmt;
use std::sync::Arc;

/// Publishes each message to a fixed, ordered set of subscriber channels.
///
/// The subscriber set is captured at construction and never changes. A
/// subscriber that fails (by returning an error or panicking) is logged and
/// skipped; the remaining subscribers still receive the message.
pub struct PublishSubscribeChannel<T> {
  fiber: Arc<dyn Fiber>,
  subscribers: Arc<[Arc<dyn Channel<T>>]>,
  logger: Arc<dyn ErrorLog>,
}

impl<T> PublishSubscribeChannel<T> {
  pub fn new<I>(fiber: Arc<dyn Fiber>, subscribers: I) -> Self
  where
    I: IntoIterator<Item = Arc<dyn Channel<T>>>,
  {
    Self::with_logger(fiber, subscribers, Arc::new(TracingLog))
  }

  pub fn with_logger<I>(fiber: Arc<dyn Fiber>, subscribers: I, logger: Arc<dyn ErrorLog>) -> Self
  where
    I: IntoIterator<Item = Arc<dyn Channel<T>>>,
  {
    Self {
      fiber,
      subscribers: subscribers.into_iter().collect(),
      logger,
    }
  }

  pub fn subscribers(&self) -> &[Arc<dyn Channel<T>>] {
    &self.subscribers
  }
}

impl<T> fmt::Debug for PublishSubscribeChannel<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PublishSubscribeChannel")
      .field("subscribers", &self.subscribers.len())
      .finish_non_exhaustive()
  }
}

impl<T: Clone + Send + 'static> Channel<T> for PublishSubscribeChannel<T> {
  fn send(&self, message: T) -> Result<(), ChannelError> {
    let subscribers = self.subscribers.clone();
    let logger = self.logger.clone();
    self.fiber.enqueue(Box::new(move || {
      for subscriber in subscribers.iter() {
        let message = message.clone();
        guard::isolate(&*logger, "Subscriber exception on Send", || {
          subscriber.send(message).map_err(ActionFailure::from)
        });
      }
    }))?;
    Ok(())
  }
}
