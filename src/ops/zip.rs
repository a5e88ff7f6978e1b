use std::{
  collections::VecDeque,
  sync::{Arc, Mutex},
};

use crate::{
  async_lock::AsyncLock,
  observable::Observable,
  observer::{Observer, SharedObserver},
  subscription::{
    SingleAssignmentSubscription, StableCompositeSubscription,
    SubscriptionLike,
  },
};

/// Pair the n-th value of one source with the n-th value of another.
///
/// The faster side is buffered. The zipped stream completes as soon as one
/// side has completed and its buffer is drained, since no further pair can
/// ever form; at that point the other side is unsubscribed.
pub struct ZipOp<A, B> {
  pub(crate) source_a: A,
  pub(crate) source_b: B,
}

struct ZipState<ItemA, ItemB> {
  buffer_a: VecDeque<ItemA>,
  buffer_b: VecDeque<ItemB>,
  done_a: bool,
  done_b: bool,
}

impl<ItemA, ItemB> ZipState<ItemA, ItemB> {
  fn pop_pair(&mut self) -> Option<(ItemA, ItemB)> {
    if !self.buffer_a.is_empty() && !self.buffer_b.is_empty() {
      let a = self.buffer_a.pop_front();
      let b = self.buffer_b.pop_front();
      a.zip(b)
    } else {
      None
    }
  }

  /// No pair can form anymore once an exhausted side is also complete.
  fn starved(&self) -> bool {
    (self.done_a && self.buffer_a.is_empty())
      || (self.done_b && self.buffer_b.is_empty())
  }
}

impl<A, B> Observable for ZipOp<A, B>
where
  A: Observable,
  B: Observable<Err = A::Err>,
  A::Item: Send + 'static,
  B::Item: Send + 'static,
  A::Err: Send + 'static,
{
  type Item = (A::Item, B::Item);
  type Err = A::Err;
  type Unsub = StableCompositeSubscription;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<Self::Item, Self::Err> + Send + 'static,
  {
    let shared = SharedObserver::new(observer);
    let gate = Arc::new(AsyncLock::new());
    let state = Arc::new(Mutex::new(ZipState {
      buffer_a: VecDeque::new(),
      buffer_b: VecDeque::new(),
      done_a: false,
      done_b: false,
    }));
    let slot_a = SingleAssignmentSubscription::new();
    let slot_b = SingleAssignmentSubscription::new();
    let composite = StableCompositeSubscription::new([
      slot_a.clone().boxed(),
      slot_b.clone().boxed(),
    ]);

    let observer_a = ZipObserverA {
      downstream: shared.clone(),
      gate: gate.clone(),
      state: state.clone(),
      composite: composite.clone(),
    };
    let observer_b = ZipObserverB {
      downstream: shared,
      gate,
      state,
      composite: composite.clone(),
    };
    slot_a.set(self.source_a.actual_subscribe(observer_a));
    slot_b.set(self.source_b.actual_subscribe(observer_b));
    composite
  }
}

struct ZipObserverA<ItemA, ItemB, O> {
  downstream: SharedObserver<O>,
  gate: Arc<AsyncLock>,
  state: Arc<Mutex<ZipState<ItemA, ItemB>>>,
  composite: StableCompositeSubscription,
}

struct ZipObserverB<ItemA, ItemB, O> {
  downstream: SharedObserver<O>,
  gate: Arc<AsyncLock>,
  state: Arc<Mutex<ZipState<ItemA, ItemB>>>,
  composite: StableCompositeSubscription,
}

/// Buffer one arrival, emit every pair that is now ready, then complete if
/// a side has starved. Runs as a gate action.
fn drain_ready<ItemA, ItemB, Err, O>(
  state: &Arc<Mutex<ZipState<ItemA, ItemB>>>,
  downstream: &mut SharedObserver<O>,
  composite: &mut StableCompositeSubscription,
) where
  O: Observer<(ItemA, ItemB), Err>,
{
  loop {
    let pair = state.lock().unwrap().pop_pair();
    match pair {
      Some(pair) => downstream.next(pair),
      None => break,
    }
  }
  if state.lock().unwrap().starved() {
    downstream.complete();
    composite.unsubscribe();
  }
}

impl<ItemA, ItemB, Err, O> Observer<ItemA, Err>
  for ZipObserverA<ItemA, ItemB, O>
where
  ItemA: Send + 'static,
  ItemB: Send + 'static,
  Err: Send + 'static,
  O: Observer<(ItemA, ItemB), Err> + Send + 'static,
{
  fn next(&mut self, value: ItemA) {
    let state = self.state.clone();
    let mut downstream = self.downstream.clone();
    let mut composite = self.composite.clone();
    self.gate.wait(move || {
      state.lock().unwrap().buffer_a.push_back(value);
      drain_ready::<ItemA, ItemB, Err, O>(
        &state,
        &mut downstream,
        &mut composite,
      );
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
    let state = self.state.clone();
    let mut downstream = self.downstream.clone();
    let mut composite = self.composite.clone();
    self.gate.wait(move || {
      state.lock().unwrap().done_a = true;
      if state.lock().unwrap().starved() {
        downstream.complete();
        composite.unsubscribe();
      }
    });
  }

  fn is_closed(&self) -> bool {
    Observer::<(ItemA, ItemB), Err>::is_closed(&self.downstream)
  }
}

impl<ItemA, ItemB, Err, O> Observer<ItemB, Err>
  for ZipObserverB<ItemA, ItemB, O>
where
  ItemA: Send + 'static,
  ItemB: Send + 'static,
  Err: Send + 'static,
  O: Observer<(ItemA, ItemB), Err> + Send + 'static,
{
  fn next(&mut self, value: ItemB) {
    let state = self.state.clone();
    let mut downstream = self.downstream.clone();
    let mut composite = self.composite.clone();
    self.gate.wait(move || {
      state.lock().unwrap().buffer_b.push_back(value);
      drain_ready::<ItemA, ItemB, Err, O>(
        &state,
        &mut downstream,
        &mut composite,
      );
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
    let state = self.state.clone();
    let mut downstream = self.downstream.clone();
    let mut composite = self.composite.clone();
    self.gate.wait(move || {
      state.lock().unwrap().done_b = true;
      if state.lock().unwrap().starved() {
        downstream.complete();
        composite.unsubscribe();
      }
    });
  }

  fn is_closed(&self) -> bool {
    Observer::<(ItemA, ItemB), Err>::is_closed(&self.downstream)
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::{observable::from_iter, subject::Subject};
  use std::sync::{Arc, Mutex};

  #[test]
  fn pairs_in_order_and_completes_on_shorter_side() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let completions = Arc::new(Mutex::new(0));
    let s = seen.clone();
    let c = completions.clone();
    from_iter::<_, ()>(vec![1, 2, 3])
      .zip(from_iter(vec!["a", "b"]))
      .subscribe_all(
        move |pair| s.lock().unwrap().push(pair),
        |_| {},
        move || *c.lock().unwrap() += 1,
      );
    assert_eq!(*seen.lock().unwrap(), vec![(1, "a"), (2, "b")]);
    assert_eq!(*completions.lock().unwrap(), 1);
  }

  #[test]
  fn buffers_the_faster_side() {
    let left = Subject::<i32, ()>::new();
    let right = Subject::<&'static str, ()>::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    let _subscription = left
      .clone()
      .zip(right.clone())
      .subscribe(move |pair| s.lock().unwrap().push(pair));

    let mut left_in = left;
    let mut right_in = right;
    left_in.next(1);
    left_in.next(2);
    left_in.next(3);
    assert!(seen.lock().unwrap().is_empty());
    right_in.next("x");
    right_in.next("y");
    assert_eq!(*seen.lock().unwrap(), vec![(1, "x"), (2, "y")]);
  }

  #[test]
  fn completed_side_with_buffered_values_still_pairs() {
    let left = Subject::<i32, ()>::new();
    let right = Subject::<i32, ()>::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let completions = Arc::new(Mutex::new(0));
    let s = seen.clone();
    let c = completions.clone();
    let _subscription = left.clone().zip(right.clone()).subscribe_all(
      move |pair| s.lock().unwrap().push(pair),
      |_| {},
      move || *c.lock().unwrap() += 1,
    );

    let mut left_in = left;
    let mut right_in = right;
    left_in.next(1);
    left_in.complete();
    // The buffered 1 can still pair before the starved side ends the stream.
    assert_eq!(*completions.lock().unwrap(), 0);
    right_in.next(10);
    assert_eq!(*seen.lock().unwrap(), vec![(1, 10)]);
    assert_eq!(*completions.lock().unwrap(), 1);
  }
}
