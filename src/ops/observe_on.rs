use std::{
  collections::VecDeque,
  sync::{Arc, Mutex},
};

use crate::{
  observable::Observable,
  observer::{Notification, Observer, SharedObserver},
  scheduler::{CancelToken, Scheduler},
  subscription::{
    SerialSubscription, SingleAssignmentSubscription,
    StableCompositeSubscription, SubscriptionLike,
  },
};

/// Re-deliver every notification on a scheduler.
///
/// Arrivals are enqueued in order and a single drain task at a time works
/// the queue off on the scheduler, so downstream delivery is serialized and
/// ordered even when the drain hops threads. Unsubscribing cancels the
/// in-flight drain between items; already-queued notifications are then
/// never delivered.
pub struct ObserveOnOp<S, SD> {
  pub(crate) source: S,
  pub(crate) scheduler: SD,
}

struct QueueState<Item, Err> {
  queue: VecDeque<Notification<Item, Err>>,
  draining: bool,
}

impl<S, SD> Observable for ObserveOnOp<S, SD>
where
  S: Observable,
  S::Item: Send + 'static,
  S::Err: Send + 'static,
  SD: Scheduler,
{
  type Item = S::Item;
  type Err = S::Err;
  type Unsub = StableCompositeSubscription;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<S::Item, S::Err> + Send + 'static,
  {
    let upstream_slot = SingleAssignmentSubscription::new();
    let drain_serial = SerialSubscription::new();
    let composite = StableCompositeSubscription::new([
      upstream_slot.clone().boxed(),
      drain_serial.clone().boxed(),
    ]);
    let observer = ObserveOnObserver {
      downstream: SharedObserver::new(observer),
      scheduler: self.scheduler,
      state: Arc::new(Mutex::new(QueueState {
        queue: VecDeque::new(),
        draining: false,
      })),
      drain_serial,
    };
    upstream_slot.set(self.source.actual_subscribe(observer));
    composite
  }
}

struct ObserveOnObserver<Item, Err, O, SD> {
  downstream: SharedObserver<O>,
  scheduler: SD,
  state: Arc<Mutex<QueueState<Item, Err>>>,
  drain_serial: SerialSubscription,
}

impl<Item, Err, O, SD> ObserveOnObserver<Item, Err, O, SD>
where
  Item: Send + 'static,
  Err: Send + 'static,
  O: Observer<Item, Err> + Send + 'static,
  SD: Scheduler,
{
  fn enqueue(&mut self, notification: Notification<Item, Err>) {
    let start_drain = {
      let mut state = self.state.lock().unwrap();
      state.queue.push_back(notification);
      if state.draining {
        false
      } else {
        state.draining = true;
        true
      }
    };
    if start_drain {
      // Slot first: the drain can finish and another producer can start a
      // new one before this frame binds its handle.
      let slot = SingleAssignmentSubscription::new();
      self.drain_serial.set(slot.clone());
      let state = self.state.clone();
      let downstream = self.downstream.clone();
      let handle = self
        .scheduler
        .schedule(None, move |token| drain(state, downstream, token));
      slot.set(handle);
    }
  }
}

/// Work the queue off until it is empty or the token is cancelled. New
/// arrivals during the drain are picked up because the queue is re-locked
/// for every item.
fn drain<Item, Err, O>(
  state: Arc<Mutex<QueueState<Item, Err>>>,
  mut downstream: SharedObserver<O>,
  token: CancelToken,
) where
  O: Observer<Item, Err>,
{
  loop {
    if token.is_cancelled() {
      return;
    }
    let next = {
      let mut state = state.lock().unwrap();
      match state.queue.pop_front() {
        Some(notification) => notification,
        None => {
          state.draining = false;
          return;
        }
      }
    };
    match next {
      Notification::Next(value) => downstream.next(value),
      Notification::Error(err) => downstream.error(err),
      Notification::Complete => downstream.complete(),
    }
  }
}

impl<Item, Err, O, SD> Observer<Item, Err>
  for ObserveOnObserver<Item, Err, O, SD>
where
  Item: Send + 'static,
  Err: Send + 'static,
  O: Observer<Item, Err> + Send + 'static,
  SD: Scheduler,
{
  fn next(&mut self, value: Item) { self.enqueue(Notification::Next(value)); }

  fn error(&mut self, err: Err) { self.enqueue(Notification::Error(err)); }

  fn complete(&mut self) { self.enqueue(Notification::Complete); }

  fn is_closed(&self) -> bool {
    Observer::<Item, Err>::is_closed(&self.downstream)
  }
}
