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

/// Interleave two sources into one stream.
///
/// Delivery to the downstream observer is serialized through an
/// [`AsyncLock`], so the sources may emit from different threads
/// concurrently. Completion waits for both sources; an error from either
/// side terminates the merge and unsubscribes the other side.
pub struct MergeOp<S1, S2> {
  pub(crate) source1: S1,
  pub(crate) source2: S2,
}

impl<S1, S2> Observable for MergeOp<S1, S2>
where
  S1: Observable,
  S2: Observable<Item = S1::Item, Err = S1::Err>,
  S1::Item: Send + 'static,
  S1::Err: Send + 'static,
{
  type Item = S1::Item;
  type Err = S1::Err;
  type Unsub = StableCompositeSubscription;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<S1::Item, S1::Err> + Send + 'static,
  {
    let shared = SharedObserver::new(observer);
    let gate = Arc::new(AsyncLock::new());
    let pending = Arc::new(Mutex::new(2usize));
    let slot1 = SingleAssignmentSubscription::new();
    let slot2 = SingleAssignmentSubscription::new();
    let composite = StableCompositeSubscription::new([
      slot1.clone().boxed(),
      slot2.clone().boxed(),
    ]);

    let first = MergeObserver {
      downstream: shared.clone(),
      gate: gate.clone(),
      pending: pending.clone(),
      composite: composite.clone(),
    };
    let second = MergeObserver {
      downstream: shared,
      gate,
      pending,
      composite: composite.clone(),
    };
    slot1.set(self.source1.actual_subscribe(first));
    slot2.set(self.source2.actual_subscribe(second));
    composite
  }
}

struct MergeObserver<O> {
  downstream: SharedObserver<O>,
  gate: Arc<AsyncLock>,
  pending: Arc<Mutex<usize>>,
  composite: StableCompositeSubscription,
}

impl<Item, Err, O> Observer<Item, Err> for MergeObserver<O>
where
  O: Observer<Item, Err> + Send + 'static,
  Item: Send + 'static,
  Err: Send + 'static,
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
    let mut downstream = self.downstream.clone();
    let pending = self.pending.clone();
    let mut composite = self.composite.clone();
    self.gate.wait(move || {
      let all_done = {
        let mut left = pending.lock().unwrap();
        *left -= 1;
        *left == 0
      };
      if all_done {
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
  use crate::observable::{from_iter, throw};
  use std::sync::{Arc, Mutex};

  #[test]
  fn interleaves_and_completes_after_both() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let completions = Arc::new(Mutex::new(0));
    let s = seen.clone();
    let c = completions.clone();
    from_iter::<_, ()>(vec![1, 2])
      .merge(from_iter(vec![3, 4]))
      .subscribe_all(
        move |v| s.lock().unwrap().push(v),
        |_| {},
        move || *c.lock().unwrap() += 1,
      );
    let mut sorted = seen.lock().unwrap().clone();
    sorted.sort_unstable();
    assert_eq!(sorted, vec![1, 2, 3, 4]);
    assert_eq!(*completions.lock().unwrap(), 1);
  }

  #[test]
  fn error_from_either_side_terminates() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let errors = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    let e = errors.clone();
    from_iter(vec![1])
      .merge(throw("side failed"))
      .subscribe_all(
        move |v| s.lock().unwrap().push(v),
        move |err| e.lock().unwrap().push(err),
        || {},
      );
    assert_eq!(*errors.lock().unwrap(), vec!["side failed"]);
  }

  #[test]
  fn concurrent_sources_deliver_serialized() {
    use crate::subject::Subject;

    let subject1 = Subject::<usize, ()>::new();
    let subject2 = Subject::<usize, ()>::new();
    let depth = Arc::new(Mutex::new((0usize, 0usize))); // (current, max)
    let total = Arc::new(Mutex::new(0usize));

    let d = depth.clone();
    let t = total.clone();
    let _subscription = subject1
      .clone()
      .merge(subject2.clone())
      .subscribe(move |_| {
        {
          let mut depth = d.lock().unwrap();
          depth.0 += 1;
          depth.1 = depth.1.max(depth.0);
        }
        *t.lock().unwrap() += 1;
        d.lock().unwrap().0 -= 1;
      });

    let producers: Vec<_> = [subject1, subject2]
      .into_iter()
      .map(|mut subject| {
        std::thread::spawn(move || {
          for i in 0..100 {
            subject.next(i);
          }
        })
      })
      .collect();
    for p in producers {
      p.join().unwrap();
    }

    assert_eq!(*total.lock().unwrap(), 200);
    assert_eq!(depth.lock().unwrap().1, 1);
  }
}
