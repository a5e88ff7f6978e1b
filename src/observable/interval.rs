use std::sync::{Arc, Mutex};

use crate::{
  observable::Observable,
  observer::Observer,
  scheduler::{Duration, Scheduler},
  subscription::{
    SerialSubscription, SingleAssignmentSubscription, SubscriptionLike,
  },
};

/// Emit `0, 1, 2, ..` every `period` on `scheduler`, forever.
///
/// Each tick schedules the next one after it fires, so the period is
/// measured tick-to-tick and scheduling jitter accumulates rather than
/// being compensated.
pub fn interval<SD>(period: Duration, scheduler: SD) -> IntervalObservable<SD> {
  IntervalObservable { period, scheduler }
}

#[derive(Clone)]
pub struct IntervalObservable<SD> {
  period: Duration,
  scheduler: SD,
}

impl<SD> Observable for IntervalObservable<SD>
where
  SD: Scheduler,
{
  type Item = usize;
  type Err = ();
  type Unsub = SerialSubscription;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<usize, ()> + Send + 'static,
  {
    let serial = SerialSubscription::new();
    let observer = Arc::new(Mutex::new(observer));
    schedule_tick(self.scheduler, self.period, observer, 0, serial.clone());
    serial
  }
}

fn schedule_tick<SD, O>(
  scheduler: SD,
  period: Duration,
  observer: Arc<Mutex<O>>,
  tick: usize,
  serial: SerialSubscription,
) where
  SD: Scheduler,
  O: Observer<usize, ()> + Send + 'static,
{
  // Install the slot before scheduling: with a zero period the tick can
  // fire and schedule its successor before this frame binds its own handle,
  // and the slot keeps that late bind from unsubscribing the successor.
  let slot = SingleAssignmentSubscription::new();
  serial.set(slot.clone());
  let handle = scheduler.schedule(Some(period), {
    let scheduler = scheduler.clone();
    let serial = serial.clone();
    move |_| {
      if serial.is_closed() {
        return;
      }
      observer.lock().unwrap().next(tick);
      schedule_tick(scheduler, period, observer, tick + 1, serial);
    }
  });
  slot.set(handle);
}
