use std::sync::{Arc, Mutex};

use crate::{
  async_lock::AsyncLock,
  observable::Observable,
  observer::{Observer, SharedObserver},
  subscription::{
    SingleAssignmentSubscription, StableCompositeSubscription,
    SubscriptionLike,
  },
};

/// Emit the latest source value at each tick of a notifier observable.
///
/// A tick takes the stored value out, so a tick with nothing fresh since
/// the previous one emits nothing. Completion of either the source or the
/// notifier completes the sampled stream; a pending value at that moment is
/// dropped.
pub struct SampleOp<S, N> {
  pub(crate) source: S,
  pub(crate) notifier: N,
}

impl<S, N> Observable for SampleOp<S, N>
where
  S: Observable,
  N: Observable<Err = S::Err>,
  S::Item: Send + 'static,
  N::Item: Send + 'static,
  S::Err: Send + 'static,
{
  type Item = S::Item;
  type Err = S::Err;
  type Unsub = StableCompositeSubscription;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<S::Item, S::Err> + Send + 'static,
  {
    let shared = SharedObserver::new(observer);
    let gate = Arc::new(AsyncLock::new());
    let latest = Arc::new(Mutex::new(None));
    let source_slot = SingleAssignmentSubscription::new();
    let notifier_slot = SingleAssignmentSubscription::new();
    let composite = StableCompositeSubscription::new([
      source_slot.clone().boxed(),
      notifier_slot.clone().boxed(),
    ]);

    let source_observer = SampleSourceObserver {
      downstream: shared.clone(),
      gate: gate.clone(),
      latest: latest.clone(),
      composite: composite.clone(),
    };
    let tick_observer = SampleTickObserver {
      downstream: shared,
      gate,
      latest,
      composite: composite.clone(),
    };
    source_slot.set(self.source.actual_subscribe(source_observer));
    notifier_slot.set(self.notifier.actual_subscribe(tick_observer));
    composite
  }
}

struct SampleSourceObserver<Item, O> {
  downstream: SharedObserver<O>,
  gate: Arc<AsyncLock>,
  latest: Arc<Mutex<Option<Item>>>,
  composite: StableCompositeSubscription,
}

impl<Item, Err, O> Observer<Item, Err> for SampleSourceObserver<Item, O>
where
  Item: Send + 'static,
  Err: Send + 'static,
  O: Observer<Item, Err> + Send + 'static,
{
  fn next(&mut self, value: Item) {
    // Overwrites an unsampled value; only the freshest one matters.
    *self.latest.lock().unwrap() = Some(value);
  }

  fn error(&mut self, err: Err) {
    let mut downstream = self.downstream.clone();
    let mut composite = self.composite.clone();
    self.gate.wait(move || {
      downstream.error(err);
      composite.unsubscribe();
    });
  }

  fn complete(&mut self) {
    let mut downstream = self.downstream.clone();
    let mut composite = self.composite.clone();
    self.gate.wait(move || {
      downstream.complete();
      composite.unsubscribe();
    });
  }

  fn is_closed(&self) -> bool {
    Observer::<Item, Err>::is_closed(&self.downstream)
  }
}

struct SampleTickObserver<Item, O> {
  downstream: SharedObserver<O>,
  gate: Arc<AsyncLock>,
  latest: Arc<Mutex<Option<Item>>>,
  composite: StableCompositeSubscription,
}

impl<Item, Tick, Err, O> Observer<Tick, Err> for SampleTickObserver<Item, O>
where
  Item: Send + 'static,
  Err: Send + 'static,
  O: Observer<Item, Err> + Send + 'static,
{
  fn next(&mut self, _tick: Tick) {
    let latest = self.latest.clone();
    let mut downstream = self.downstream.clone();
    self.gate.wait(move || {
      let sampled = latest.lock().unwrap().take();
      if let Some(value) = sampled {
        downstream.next(value);
      }
    });
  }

  fn error(&mut self, err: Err) {
    let mut downstream = self.downstream.clone();
    let mut composite = self.composite.clone();
    self.gate.wait(move || {
      downstream.error(err);
      composite.unsubscribe();
    });
  }

  fn complete(&mut self) {
    let mut downstream = self.downstream.clone();
    let mut composite = self.composite.clone();
    self.gate.wait(move || {
      downstream.complete();
      composite.unsubscribe();
    });
  }

  fn is_closed(&self) -> bool {
    Observer::<Item, Err>::is_closed(&self.downstream)
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::subject::Subject;
  use std::sync::{Arc, Mutex};

  #[test]
  fn tick_emits_only_fresh_values() {
    let source = Subject::<i32, ()>::new();
    let ticks = Subject::<(), ()>::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    let _subscription = source
      .clone()
      .sample(ticks.clone())
      .subscribe(move |v| s.lock().unwrap().push(v));

    let mut source_in = source;
    let mut ticks_in = ticks;
    source_in.next(1);
    source_in.next(2);
    ticks_in.next(()); // samples 2
    ticks_in.next(()); // nothing fresh
    source_in.next(3);
    ticks_in.next(()); // samples 3

    assert_eq!(*seen.lock().unwrap(), vec![2, 3]);
  }

  #[test]
  fn source_completion_completes_the_stream() {
    let source = Subject::<i32, ()>::new();
    let ticks = Subject::<(), ()>::new();
    let completions = Arc::new(Mutex::new(0));
    let c = completions.clone();
    let _subscription = source.clone().sample(ticks.clone()).subscribe_all(
      |_| {},
      |_| {},
      move || *c.lock().unwrap() += 1,
    );

    let mut source_in = source;
    source_in.next(5);
    source_in.complete();
    assert_eq!(*completions.lock().unwrap(), 1);
    assert_eq!(ticks.subscriber_count(), 0);
  }

  #[test]
  fn notifier_error_propagates() {
    let source = Subject::<i32, &'static str>::new();
    let ticks = Subject::<(), &'static str>::new();
    let errors = Arc::new(Mutex::new(Vec::new()));
    let e = errors.clone();
    let _subscription = source.clone().sample(ticks.clone()).subscribe_all(
      |_| {},
      move |err| e.lock().unwrap().push(err),
      || {},
    );
    let mut ticks_in = ticks;
    ticks_in.error("clock broke");
    assert_eq!(*errors.lock().unwrap(), vec!["clock broke"]);
  }
}
