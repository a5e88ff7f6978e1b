use std::sync::{Arc, Mutex};

use crate::{
  async_lock::AsyncLock,
  observable::Observable,
  observer::{Observer, SharedObserver},
  subscription::{
    SerialSubscription, SingleAssignmentSubscription,
    StableCompositeSubscription, SubscriptionLike,
  },
};

/// Flatten an observable of observables keeping only the most recent inner.
///
/// When the outer source emits a new inner observable the previous inner is
/// unsubscribed immediately. A replaced inner may still be mid-callback on
/// another thread; its in-flight notifications carry the generation number
/// they were subscribed under and are dropped at the gate when stale.
pub struct SwitchOnNextOp<S> {
  pub(crate) source: S,
}

struct SwitchState {
  generation: u64,
  inner_active: bool,
  outer_done: bool,
}

impl<S> Observable for SwitchOnNextOp<S>
where
  S: Observable,
  S::Item: Observable<Err = S::Err> + Send + 'static,
  <S::Item as Observable>::Item: Send + 'static,
  S::Err: Send + 'static,
{
  type Item = <S::Item as Observable>::Item;
  type Err = S::Err;
  type Unsub = StableCompositeSubscription;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<Self::Item, Self::Err> + Send + 'static,
  {
    let shared = SharedObserver::new(observer);
    let gate = Arc::new(AsyncLock::new());
    let state = Arc::new(Mutex::new(SwitchState {
      generation: 0,
      inner_active: false,
      outer_done: false,
    }));
    let outer_slot = SingleAssignmentSubscription::new();
    let inner_serial = SerialSubscription::new();
    let composite = StableCompositeSubscription::new([
      outer_slot.clone().boxed(),
      inner_serial.clone().boxed(),
    ]);

    let outer = SwitchOuter {
      downstream: shared,
      gate,
      state,
      inner_serial,
      composite: composite.clone(),
    };
    outer_slot.set(self.source.actual_subscribe(outer));
    composite
  }
}

struct SwitchOuter<O> {
  downstream: SharedObserver<O>,
  gate: Arc<AsyncLock>,
  state: Arc<Mutex<SwitchState>>,
  inner_serial: SerialSubscription,
  composite: StableCompositeSubscription,
}

impl<Inner, Err, O> Observer<Inner, Err> for SwitchOuter<O>
where
  Inner: Observable<Err = Err> + Send + 'static,
  Inner::Item: Send + 'static,
  Err: Send + 'static,
  O: Observer<Inner::Item, Err> + Send + 'static,
{
  fn next(&mut self, inner: Inner) {
    let generation = {
      let mut state = self.state.lock().unwrap();
      state.generation += 1;
      state.inner_active = true;
      state.generation
    };
    let inner_observer = SwitchInner {
      generation,
      downstream: self.downstream.clone(),
      gate: self.gate.clone(),
      state: self.state.clone(),
      composite: self.composite.clone(),
    };
    // set() unsubscribes the previous inner.
    self.inner_serial.set(inner.actual_subscribe(inner_observer));
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
    let state = self.state.clone();
    let mut composite = self.composite.clone();
    self.gate.wait(move || {
      let idle = {
        let mut state = state.lock().unwrap();
        state.outer_done = true;
        !state.inner_active
      };
      if idle {
        downstream.complete();
        composite.unsubscribe();
      }
    });
  }

  fn is_closed(&self) -> bool {
    Observer::<Inner::Item, Err>::is_closed(&self.downstream)
  }
}

struct SwitchInner<O> {
  generation: u64,
  downstream: SharedObserver<O>,
  gate: Arc<AsyncLock>,
  state: Arc<Mutex<SwitchState>>,
  composite: StableCompositeSubscription,
}

impl<Item, Err, O> Observer<Item, Err> for SwitchInner<O>
where
  Item: Send + 'static,
  Err: Send + 'static,
  O: Observer<Item, Err> + Send + 'static,
{
  fn next(&mut self, value: Item) {
    let generation = self.generation;
    let mut downstream = self.downstream.clone();
    let state = self.state.clone();
    self.gate.wait(move || {
      if state.lock().unwrap().generation == generation {
        downstream.next(value);
      }
    });
  }

  fn error(&mut self, err: Err) {
    let generation = self.generation;
    let mut downstream = self.downstream.clone();
    let state = self.state.clone();
    let mut composite = self.composite.clone();
    self.gate.wait(move || {
      if state.lock().unwrap().generation == generation {
        downstream.error(err);
        composite.unsubscribe();
      }
    });
  }

  fn complete(&mut self) {
    let generation = self.generation;
    let mut downstream = self.downstream.clone();
    let state = self.state.clone();
    let mut composite = self.composite.clone();
    self.gate.wait(move || {
      let finished = {
        let mut state = state.lock().unwrap();
        if state.generation != generation {
          return;
        }
        state.inner_active = false;
        state.outer_done
      };
      if finished {
        downstream.complete();
        composite.unsubscribe();
      }
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
  fn new_inner_replaces_the_previous_one() {
    let outer = Subject::<Subject<i32, ()>, ()>::new();
    let first = Subject::<i32, ()>::new();
    let second = Subject::<i32, ()>::new();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    let _subscription = outer
      .clone()
      .switch_on_next()
      .subscribe(move |v| s.lock().unwrap().push(v));

    let mut outer_in = outer;
    let mut first_in = first.clone();
    let mut second_in = second.clone();

    outer_in.next(first);
    first_in.next(1);
    outer_in.next(second);
    first_in.next(2); // stale, dropped
    second_in.next(3);

    assert_eq!(*seen.lock().unwrap(), vec![1, 3]);
    assert_eq!(first_in.subscriber_count(), 0);
  }

  #[test]
  fn completes_when_outer_and_current_inner_finish() {
    let outer = Subject::<Subject<i32, ()>, ()>::new();
    let inner = Subject::<i32, ()>::new();
    let completions = Arc::new(Mutex::new(0));
    let c = completions.clone();
    let _subscription = outer.clone().switch_on_next().subscribe_all(
      |_| {},
      |_| {},
      move || *c.lock().unwrap() += 1,
    );

    let mut outer_in = outer;
    let mut inner_in = inner.clone();
    outer_in.next(inner);
    outer_in.complete();
    assert_eq!(*completions.lock().unwrap(), 0);
    inner_in.complete();
    assert_eq!(*completions.lock().unwrap(), 1);
  }

  #[test]
  fn outer_completion_with_no_inner_completes_immediately() {
    let outer = Subject::<Subject<i32, ()>, ()>::new();
    let completions = Arc::new(Mutex::new(0));
    let c = completions.clone();
    let _subscription = outer.clone().switch_on_next().subscribe_all(
      |_| {},
      |_| {},
      move || *c.lock().unwrap() += 1,
    );
    let mut outer_in = outer;
    outer_in.complete();
    assert_eq!(*completions.lock().unwrap(), 1);
  }
}
