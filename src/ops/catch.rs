use std::{
  marker::PhantomData,
  sync::{Arc, Mutex},
};

use crate::{
  observable::Observable,
  observer::{Observer, SharedObserver},
  subscription::{SerialSubscription, SingleAssignmentSubscription},
};

/// Swap to a fallback observable when the source errors.
///
/// The handler runs at most once and its fallback is subscribed with the
/// original downstream observer directly, so an error of the fallback is
/// not caught again. Values emitted before the error stay delivered; the
/// downstream never sees the swallowed error itself.
pub struct CatchOp<S, F, Fallback> {
  pub(crate) source: S,
  pub(crate) handler: F,
  pub(crate) _fallback: PhantomData<fn() -> Fallback>,
}

impl<S, F, Fallback> Observable for CatchOp<S, F, Fallback>
where
  S: Observable,
  Fallback: Observable<Item = S::Item> + 'static,
  F: FnOnce(S::Err) -> Fallback + Send + 'static,
{
  type Item = S::Item;
  type Err = Fallback::Err;
  type Unsub = SerialSubscription;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<S::Item, Fallback::Err> + Send + 'static,
  {
    let serial = SerialSubscription::new();
    let catch_observer = CatchObserver {
      downstream: SharedObserver::new(observer),
      handler: Some(self.handler),
      serial: serial.clone(),
      _fallback: PhantomData,
    };
    // Bind the primary through a slot: a synchronous error swaps the serial
    // to the fallback, and the late bind then retires the dead primary
    // instead of the live fallback subscription.
    let slot = SingleAssignmentSubscription::new();
    serial.set(slot.clone());
    slot.set(self.source.actual_subscribe(catch_observer));
    serial
  }
}

struct CatchObserver<O, F, Fallback> {
  downstream: SharedObserver<O>,
  handler: Option<F>,
  serial: SerialSubscription,
  _fallback: PhantomData<fn() -> Fallback>,
}

impl<Item, Err, O, F, Fallback> Observer<Item, Err>
  for CatchObserver<O, F, Fallback>
where
  Fallback: Observable<Item = Item>,
  F: FnOnce(Err) -> Fallback + Send + 'static,
  O: Observer<Item, Fallback::Err> + Send + 'static,
{
  fn next(&mut self, value: Item) { self.downstream.next(value); }

  fn error(&mut self, err: Err) {
    if let Some(handler) = self.handler.take() {
      let fallback = handler(err);
      self
        .serial
        .set(fallback.actual_subscribe(self.downstream.clone()));
    }
  }

  fn complete(&mut self) { self.downstream.complete(); }

  fn is_closed(&self) -> bool {
    Observer::<Item, Fallback::Err>::is_closed(&self.downstream)
  }
}

/// Run through `sources` in order: subscribe the first, and on error move
/// on to the next. The error of the last source (or a completed source's
/// completion) is what the downstream finally sees.
pub fn catch_sequence<I>(sources: I) -> CatchSequenceOp<I::IntoIter>
where
  I: IntoIterator,
  I::Item: Observable,
{
  CatchSequenceOp { sources: sources.into_iter() }
}

pub struct CatchSequenceOp<I> {
  sources: I,
}

impl<I, S> Observable for CatchSequenceOp<I>
where
  I: Iterator<Item = S> + Send + 'static,
  S: Observable,
{
  type Item = S::Item;
  type Err = S::Err;
  type Unsub = SerialSubscription;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<S::Item, S::Err> + Send + 'static,
  {
    let serial = SerialSubscription::new();
    let mut sources = self.sources;
    let mut downstream = SharedObserver::new(observer);
    match sources.next() {
      Some(first) => {
        let sequence_observer = CatchSequenceObserver {
          downstream,
          cursor: Arc::new(Mutex::new(sources)),
          serial: serial.clone(),
        };
        let slot = SingleAssignmentSubscription::new();
        serial.set(slot.clone());
        slot.set(first.actual_subscribe(sequence_observer));
      }
      // No sources at all behaves like an empty stream.
      None => downstream.complete(),
    }
    serial
  }
}

struct CatchSequenceObserver<I, O> {
  downstream: SharedObserver<O>,
  cursor: Arc<Mutex<I>>,
  serial: SerialSubscription,
}

impl<I, O> Clone for CatchSequenceObserver<I, O> {
  fn clone(&self) -> Self {
    CatchSequenceObserver {
      downstream: self.downstream.clone(),
      cursor: self.cursor.clone(),
      serial: self.serial.clone(),
    }
  }
}

impl<I, S, O> Observer<S::Item, S::Err> for CatchSequenceObserver<I, O>
where
  I: Iterator<Item = S> + Send + 'static,
  S: Observable,
  O: Observer<S::Item, S::Err> + Send + 'static,
{
  fn next(&mut self, value: S::Item) { self.downstream.next(value); }

  fn error(&mut self, err: S::Err) {
    let next_source = self.cursor.lock().unwrap().next();
    match next_source {
      // A synchronously failing source re-enters this method under the
      // slot's bind; the swap below keeps the late bind from undoing it.
      Some(source) => {
        let slot = SingleAssignmentSubscription::new();
        self.serial.set(slot.clone());
        slot.set(source.actual_subscribe(self.clone()));
      }
      // Exhausted: the last error is the stream's error.
      None => self.downstream.error(err),
    }
  }

  fn complete(&mut self) { self.downstream.complete(); }

  fn is_closed(&self) -> bool {
    Observer::<S::Item, S::Err>::is_closed(&self.downstream)
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::observable::{from_iter, of, throw};
  use std::sync::{Arc, Mutex};

  #[test]
  fn error_switches_to_the_fallback() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let completions = Arc::new(Mutex::new(0));
    let s = seen.clone();
    let c = completions.clone();
    crate::observable::create(|observer: &mut dyn Observer<i32, &'static str>| {
      observer.next(1);
      Err("primary down")
    })
    .catch(|_err| from_iter(vec![8, 9]))
    .subscribe_all(
      move |v| s.lock().unwrap().push(v),
      |_: &'static str| {},
      move || *c.lock().unwrap() += 1,
    );
    assert_eq!(*seen.lock().unwrap(), vec![1, 8, 9]);
    assert_eq!(*completions.lock().unwrap(), 1);
  }

  #[test]
  fn fallback_error_is_not_caught_again() {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let e = errors.clone();
    throw::<i32, &'static str>("first")
      .catch(|_err| throw::<i32, &'static str>("second"))
      .subscribe_all(
        |_| {},
        move |err| e.lock().unwrap().push(err),
        || {},
      );
    assert_eq!(*errors.lock().unwrap(), vec!["second"]);
  }

  #[test]
  fn sequence_tries_each_source_in_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    catch_sequence(vec![
      throw::<i32, &'static str>("a").box_it(),
      throw::<i32, &'static str>("b").box_it(),
      of(42).box_it(),
    ])
    .subscribe(move |v| s.lock().unwrap().push(v));
    assert_eq!(*seen.lock().unwrap(), vec![42]);
  }

  #[test]
  fn async_fallback_survives_a_synchronous_error() {
    use crate::{observable::timer, scheduler::default_pool};
    use std::sync::mpsc::channel;
    use std::time::Duration;

    let (tx, rx) = channel();
    let _subscription = throw::<i32, &'static str>("down")
      .catch(|_err| timer(42, Duration::from_millis(20), default_pool()))
      .subscribe(move |v| tx.send(v).unwrap());
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(42));
  }

  #[test]
  fn sequence_reaches_an_async_source_after_sync_errors() {
    use crate::{observable::timer, scheduler::default_pool};
    use std::sync::mpsc::channel;
    use std::time::Duration;

    let (tx, rx) = channel();
    let _subscription = catch_sequence(vec![
      throw::<i32, ()>(()).box_it(),
      timer(5, Duration::from_millis(10), default_pool()).box_it(),
    ])
    .subscribe(move |v| tx.send(v).unwrap());
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(5));
  }

  #[test]
  fn exhausted_sequence_propagates_the_last_error() {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let e = errors.clone();
    catch_sequence(vec![
      throw::<i32, &'static str>("x").box_it(),
      throw::<i32, &'static str>("y").box_it(),
    ])
    .subscribe_all(
      |_| {},
      move |err| e.lock().unwrap().push(err),
      || {},
    );
    assert_eq!(*errors.lock().unwrap(), vec!["y"]);
  }
}
