use crate::{
  observable::Observable,
  observer::Observer,
  scheduler::{Duration, Instant, Scheduler, TaskHandle},
};

/// Emit `value` once after `delay`, then complete, on `scheduler`.
pub fn timer<Item, SD>(
  value: Item,
  delay: Duration,
  scheduler: SD,
) -> TimerObservable<Item, SD> {
  TimerObservable { value, due: TimerDue::After(delay), scheduler }
}

/// Emit `value` once at the absolute time `due`, then complete. A due time
/// in the past fires as soon as the scheduler can run it.
pub fn timer_at<Item, SD>(
  value: Item,
  due: Instant,
  scheduler: SD,
) -> TimerObservable<Item, SD> {
  TimerObservable { value, due: TimerDue::At(due), scheduler }
}

#[derive(Clone, Copy)]
enum TimerDue {
  After(Duration),
  At(Instant),
}

#[derive(Clone)]
pub struct TimerObservable<Item, SD> {
  value: Item,
  due: TimerDue,
  scheduler: SD,
}

impl<Item, SD> Observable for TimerObservable<Item, SD>
where
  Item: Send + 'static,
  SD: Scheduler,
{
  type Item = Item;
  type Err = ();
  type Unsub = TaskHandle;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<Item, ()> + Send + 'static,
  {
    let TimerObservable { value, due, scheduler } = self;
    let task = move |_| {
      let mut observer = observer;
      observer.next(value);
      observer.complete();
    };
    match due {
      TimerDue::After(delay) => scheduler.schedule(Some(delay), task),
      TimerDue::At(at) => scheduler.schedule_at(at, task),
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::scheduler::default_pool;
  use crate::subscription::SubscriptionLike;
  use std::sync::mpsc::channel;

  #[test]
  fn fires_once_then_completes() {
    let (tx, rx) = channel();
    let done_tx = tx.clone();
    timer(7, Duration::from_millis(10), default_pool()).subscribe_all(
      move |v| tx.send(format!("next {}", v)).unwrap(),
      |_| {},
      move || done_tx.send("complete".into()).unwrap(),
    );
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "next 7");
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "complete");
  }

  #[test]
  fn timer_at_past_due_fires_promptly() {
    let (tx, rx) = channel();
    timer_at(1, Instant::now() - Duration::from_millis(5), default_pool())
      .subscribe(move |v| tx.send(v).unwrap());
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 1);
  }

  #[test]
  fn unsubscribed_timer_never_fires() {
    let (tx, rx) = channel::<i32>();
    let mut subscription =
      timer(1, Duration::from_millis(40), default_pool())
        .subscribe(move |v| tx.send(v).unwrap());
    subscription.unsubscribe();
    assert!(rx.recv_timeout(Duration::from_millis(150)).is_err());
  }
}
