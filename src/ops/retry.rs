use std::sync::{Arc, Mutex};

use crate::{
  observable::Observable,
  observer::{Observer, SharedObserver},
  subscription::{SerialSubscription, SingleAssignmentSubscription},
};

/// Resubscribe to the source when it errors.
///
/// `count: Some(n)` allows `n` retries on top of the first attempt and then
/// lets the error through; `None` retries without bound. A source that
/// fails synchronously on every attempt with `None` will loop on the
/// subscribing thread, the retry itself adds no scheduling.
pub struct RetryOp<S> {
  pub(crate) source: S,
  pub(crate) count: Option<usize>,
}

impl<S> Observable for RetryOp<S>
where
  S: Observable + Clone + Send + 'static,
{
  type Item = S::Item;
  type Err = S::Err;
  type Unsub = SerialSubscription;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<S::Item, S::Err> + Send + 'static,
  {
    let serial = SerialSubscription::new();
    let retry_observer = RetryObserver {
      source: self.source.clone(),
      remaining: Arc::new(Mutex::new(self.count)),
      downstream: SharedObserver::new(observer),
      serial: serial.clone(),
    };
    // Bind through a slot: an attempt that errors synchronously swaps the
    // serial to the next attempt before this frame's bind lands, and the
    // slot then retires the dead attempt instead of the live one.
    let slot = SingleAssignmentSubscription::new();
    serial.set(slot.clone());
    slot.set(self.source.actual_subscribe(retry_observer));
    serial
  }
}

struct RetryObserver<S, O> {
  source: S,
  remaining: Arc<Mutex<Option<usize>>>,
  downstream: SharedObserver<O>,
  serial: SerialSubscription,
}

impl<S: Clone, O> Clone for RetryObserver<S, O> {
  fn clone(&self) -> Self {
    RetryObserver {
      source: self.source.clone(),
      remaining: self.remaining.clone(),
      downstream: self.downstream.clone(),
      serial: self.serial.clone(),
    }
  }
}

impl<S, O> Observer<S::Item, S::Err> for RetryObserver<S, O>
where
  S: Observable + Clone + Send + 'static,
  O: Observer<S::Item, S::Err> + Send + 'static,
{
  fn next(&mut self, value: S::Item) { self.downstream.next(value); }

  fn error(&mut self, err: S::Err) {
    let try_again = {
      let mut remaining = self.remaining.lock().unwrap();
      match remaining.as_mut() {
        None => true,
        Some(0) => false,
        Some(n) => {
          *n -= 1;
          true
        }
      }
    };
    if try_again {
      let attempt = self.source.clone();
      let slot = SingleAssignmentSubscription::new();
      self.serial.set(slot.clone());
      slot.set(attempt.actual_subscribe(self.clone()));
    } else {
      self.downstream.error(err);
    }
  }

  fn complete(&mut self) { self.downstream.complete(); }

  fn is_closed(&self) -> bool {
    Observer::<S::Item, S::Err>::is_closed(&self.downstream)
  }
}
