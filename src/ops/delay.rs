use std::{
  collections::VecDeque,
  sync::{Arc, Mutex},
};

use crate::{
  observable::Observable,
  observer::{Notification, Observer, SharedObserver},
  scheduler::{CancelToken, Duration, Instant, Scheduler},
  subscription::{
    SerialSubscription, SingleAssignmentSubscription,
    StableCompositeSubscription, SubscriptionLike,
  },
};

/// Shift every notification, terminals included, by a fixed delay.
///
/// Each arrival is stamped with its due time on arrival, so the source's
/// pacing is preserved: the whole stream replays `delay` later. One drain
/// task at a time sleeps until the front of the queue is due and delivers
/// it; relative order can never invert because all stamps share the same
/// offset.
pub struct DelayOp<S, SD> {
  pub(crate) source: S,
  pub(crate) delay: Duration,
  pub(crate) scheduler: SD,
}

struct DelayState<Item, Err> {
  queue: VecDeque<(Instant, Notification<Item, Err>)>,
  draining: bool,
}

impl<S, SD> Observable for DelayOp<S, SD>
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
    let observer = DelayObserver {
      downstream: SharedObserver::new(observer),
      scheduler: self.scheduler,
      delay: self.delay,
      state: Arc::new(Mutex::new(DelayState {
        queue: VecDeque::new(),
        draining: false,
      })),
      drain_serial,
    };
    upstream_slot.set(self.source.actual_subscribe(observer));
    composite
  }
}

struct DelayObserver<Item, Err, O, SD> {
  downstream: SharedObserver<O>,
  scheduler: SD,
  delay: Duration,
  state: Arc<Mutex<DelayState<Item, Err>>>,
  drain_serial: SerialSubscription,
}

impl<Item, Err, O, SD> DelayObserver<Item, Err, O, SD>
where
  Item: Send + 'static,
  Err: Send + 'static,
  O: Observer<Item, Err> + Send + 'static,
  SD: Scheduler,
{
  fn enqueue(&mut self, notification: Notification<Item, Err>) {
    let due = self.scheduler.now() + self.delay;
    let start_drain = {
      let mut state = self.state.lock().unwrap();
      state.queue.push_back((due, notification));
      if state.draining {
        false
      } else {
        state.draining = true;
        true
      }
    };
    if start_drain {
      schedule_drain(
        self.scheduler.clone(),
        self.delay,
        self.state.clone(),
        self.downstream.clone(),
        self.drain_serial.clone(),
      );
    }
  }
}

fn schedule_drain<Item, Err, O, SD>(
  scheduler: SD,
  wait: Duration,
  state: Arc<Mutex<DelayState<Item, Err>>>,
  downstream: SharedObserver<O>,
  drain_serial: SerialSubscription,
) where
  Item: Send + 'static,
  Err: Send + 'static,
  O: Observer<Item, Err> + Send + 'static,
  SD: Scheduler,
{
  // Slot first: a short wait lets the drain run and re-schedule itself
  // before this frame binds its handle; the late bind must retire the dead
  // handle, not the re-scheduled one.
  let slot = SingleAssignmentSubscription::new();
  drain_serial.set(slot.clone());
  let handle = scheduler.clone().schedule(Some(wait), {
    let drain_serial = drain_serial.clone();
    move |token| {
      drain(scheduler, state, downstream, drain_serial, token)
    }
  });
  slot.set(handle);
}

/// Deliver everything that is due; if the queue still holds future items,
/// re-schedule for the front one's remaining wait.
fn drain<Item, Err, O, SD>(
  scheduler: SD,
  state: Arc<Mutex<DelayState<Item, Err>>>,
  mut downstream: SharedObserver<O>,
  drain_serial: SerialSubscription,
  token: CancelToken,
) where
  Item: Send + 'static,
  Err: Send + 'static,
  O: Observer<Item, Err> + Send + 'static,
  SD: Scheduler,
{
  loop {
    if token.is_cancelled() {
      return;
    }
    let now = scheduler.now();
    let step = {
      let mut guard = state.lock().unwrap();
      match guard.queue.front() {
        None => {
          guard.draining = false;
          return;
        }
        Some((due, _)) if *due <= now => {
          let (_, notification) = guard.queue.pop_front().unwrap();
          Ok(notification)
        }
        Some((due, _)) => Err(due.saturating_duration_since(now)),
      }
    };
    match step {
      Ok(Notification::Next(value)) => downstream.next(value),
      Ok(Notification::Error(err)) => downstream.error(err),
      Ok(Notification::Complete) => downstream.complete(),
      Err(wait) => {
        schedule_drain(scheduler, wait, state, downstream, drain_serial);
        return;
      }
    }
  }
}

impl<Item, Err, O, SD> Observer<Item, Err> for DelayObserver<Item, Err, O, SD>
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
