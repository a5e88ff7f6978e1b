use std::sync::{Arc, Mutex};

use crate::subscription::{BoxSubscription, SubscriptionLike};

struct SerialState {
  closed: bool,
  current: Option<BoxSubscription>,
}

/// A subscription slot holding one "current" inner subscription.
///
/// Each assignment unsubscribes the previous inner, so at most one inner
/// subscription is ever live. This is what Switch and Catch/Retry build on:
/// the old attempt's subscription is torn down when the next one is
/// installed. Once the serial container itself is unsubscribed, every later
/// assignment is unsubscribed on arrival.
#[derive(Clone)]
pub struct SerialSubscription(Arc<Mutex<SerialState>>);

impl Default for SerialSubscription {
  fn default() -> Self {
    SerialSubscription(Arc::new(Mutex::new(SerialState {
      closed: false,
      current: None,
    })))
  }
}

impl SerialSubscription {
  pub fn new() -> Self { Self::default() }

  /// Install `subscription` as the current inner, unsubscribing the previous
  /// one (or the incoming one, if this container is already closed).
  pub fn set(&self, subscription: impl SubscriptionLike + Send + 'static) {
    let incoming: BoxSubscription = Box::new(subscription);
    let old = {
      let mut state = self.0.lock().unwrap();
      if state.closed {
        Some(incoming)
      } else {
        std::mem::replace(&mut state.current, Some(incoming))
      }
    };
    if let Some(mut s) = old {
      s.unsubscribe();
    }
  }
}

impl SubscriptionLike for SerialSubscription {
  fn unsubscribe(&mut self) {
    let current = {
      let mut state = self.0.lock().unwrap();
      state.closed = true;
      state.current.take()
    };
    if let Some(mut s) = current {
      s.unsubscribe();
    }
  }

  fn is_closed(&self) -> bool { self.0.lock().unwrap().closed }
}
