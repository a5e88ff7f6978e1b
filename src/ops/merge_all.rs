use std::sync::{Arc, Mutex};

use crate::{
  async_lock::AsyncLock,
  observable::Observable,
  observer::{Observer, SharedObserver},
  subscription::{
    CompositeSubscription, SingleAssignmentSubscription, SubscriptionLike,
  },
};

/// Flatten an observable of observables with unbounded concurrency.
///
/// Every inner observable is subscribed as soon as it arrives and all of
/// them run at once; emissions are serialized into the downstream through
/// one gate. The flattened stream completes when the outer source and every
/// inner observable have completed.
pub struct MergeAllOp<S> {
  pub(crate) source: S,
}

impl<S> Observable for MergeAllOp<S>
where
  S: Observable,
  S::Item: Observable<Err = S::Err> + Send + 'static,
  <S::Item as Observable>::Item: Send + 'static,
  S::Err: Send + 'static,
{
  type Item = <S::Item as Observable>::Item;
  type Err = S::Err;
  type Unsub = CompositeSubscription;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<Self::Item, Self::Err> + Send + 'static,
  {
    let shared = SharedObserver::new(observer);
    let gate = Arc::new(AsyncLock::new());
    // The outer source holds one pending unit until it completes, so early
    // inner completions cannot complete the merge prematurely.
    let pending = Arc::new(Mutex::new(1usize));
    let composite = CompositeSubscription::new();

    let outer = OuterObserver {
      downstream: shared,
      gate,
      pending,
      composite: composite.clone(),
    };
    let outer_slot = SingleAssignmentSubscription::new();
    composite.add(outer_slot.clone());
    outer_slot.set(self.source.actual_subscribe(outer));
    composite
  }
}

struct OuterObserver<O> {
  downstream: SharedObserver<O>,
  gate: Arc<AsyncLock>,
  pending: Arc<Mutex<usize>>,
  composite: CompositeSubscription,
}

impl<Inner, Err, O> Observer<Inner, Err> for OuterObserver<O>
where
  Inner: Observable<Err = Err> + Send + 'static,
  Inner::Item: Send + 'static,
  Err: Send + 'static,
  O: Observer<Inner::Item, Err> + Send + 'static,
{
  fn next(&mut self, inner: Inner) {
    *self.pending.lock().unwrap() += 1;
    let slot = SingleAssignmentSubscription::new();
    let key = self.composite.add(slot.clone());
    let inner_observer = InnerObserver {
      downstream: self.downstream.clone(),
      gate: self.gate.clone(),
      pending: self.pending.clone(),
      composite: self.composite.clone(),
      key,
    };
    slot.set(inner.actual_subscribe(inner_observer));
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
    settle_one::<Inner::Item, Err, O>(
      &self.gate,
      &self.pending,
      &self.downstream,
      &self.composite,
      None,
    );
  }

  fn is_closed(&self) -> bool {
    Observer::<Inner::Item, Err>::is_closed(&self.downstream)
  }
}

struct InnerObserver<O> {
  downstream: SharedObserver<O>,
  gate: Arc<AsyncLock>,
  pending: Arc<Mutex<usize>>,
  composite: CompositeSubscription,
  // None when the merge was already torn down as this inner arrived.
  key: Option<u64>,
}

impl<Item, Err, O> Observer<Item, Err> for InnerObserver<O>
where
  Item: Send + 'static,
  Err: Send + 'static,
  O: Observer<Item, Err> + Send + 'static,
{
  fn next(&mut self, value: Item) {
    let mut downstream = self.downstream.clone();
    self.gate.wait(move || downstream.next(value));
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
    settle_one::<Item, Err, O>(
      &self.gate,
      &self.pending,
      &self.downstream,
      &self.composite,
      self.key,
    );
  }

  fn is_closed(&self) -> bool {
    Observer::<Item, Err>::is_closed(&self.downstream)
  }
}

/// Retire one pending unit under the gate; the last one out completes the
/// downstream and tears the whole merge down.
fn settle_one<Item, Err, O>(
  gate: &Arc<AsyncLock>,
  pending: &Arc<Mutex<usize>>,
  downstream: &SharedObserver<O>,
  composite: &CompositeSubscription,
  retire_key: Option<u64>,
) where
  Item: Send + 'static,
  Err: Send + 'static,
  O: Observer<Item, Err> + Send + 'static,
{
  let pending = pending.clone();
  let mut downstream = downstream.clone();
  let mut composite_handle = composite.clone();
  let composite = composite.clone();
  gate.wait(move || {
    if let Some(key) = retire_key {
      composite.remove(key);
    }
    let all_done = {
      let mut left = pending.lock().unwrap();
      *left -= 1;
      *left == 0
    };
    if all_done {
      downstream.complete();
      composite_handle.unsubscribe();
    }
  });
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::observable::{from_iter, of};
  use std::sync::{Arc, Mutex};

  #[test]
  fn flattens_every_inner_source() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let completions = Arc::new(Mutex::new(0));
    let s = seen.clone();
    let c = completions.clone();
    from_iter::<_, ()>(vec![
      from_iter(vec![1, 2]),
      from_iter(vec![3]),
      from_iter(vec![4, 5]),
    ])
    .merge_all()
    .subscribe_all(
      move |v| s.lock().unwrap().push(v),
      |_| {},
      move || *c.lock().unwrap() += 1,
    );
    let mut sorted = seen.lock().unwrap().clone();
    sorted.sort_unstable();
    assert_eq!(sorted, vec![1, 2, 3, 4, 5]);
    assert_eq!(*completions.lock().unwrap(), 1);
  }

  #[test]
  fn completes_only_after_outer_and_inners() {
    use crate::subject::Subject;

    let outer = Subject::<Subject<i32, ()>, ()>::new();
    let inner = Subject::<i32, ()>::new();
    let completions = Arc::new(Mutex::new(0));
    let c = completions.clone();
    let _subscription = outer.clone().merge_all().subscribe_all(
      |_| {},
      |_| {},
      move || *c.lock().unwrap() += 1,
    );

    let mut outer_in = outer;
    let mut inner_in = inner.clone();
    outer_in.next(inner);
    outer_in.complete();
    assert_eq!(*completions.lock().unwrap(), 0);
    inner_in.next(9);
    inner_in.complete();
    assert_eq!(*completions.lock().unwrap(), 1);
  }

  #[test]
  fn single_inner_stream_passes_through() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    of::<_, ()>(from_iter(vec![7, 8]))
      .merge_all()
      .subscribe(move |v| s.lock().unwrap().push(v));
    assert_eq!(*seen.lock().unwrap(), vec![7, 8]);
  }
}
