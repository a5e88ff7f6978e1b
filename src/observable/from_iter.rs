use std::marker::PhantomData;

use crate::{
  observable::Observable, observer::Observer, subscription::NopSubscription,
};

/// Emit every item of `iter` and complete.
///
/// Emission is synchronous and checks `observer.is_closed()` between items,
/// so a consumer that stops accepting cuts the iteration short.
pub fn from_iter<I, Err>(iter: I) -> FromIterObservable<I, Err>
where
  I: IntoIterator,
{
  FromIterObservable { iter, _err: PhantomData }
}

/// Emit a single value and complete.
pub fn of<Item, Err>(value: Item) -> OfObservable<Item, Err> {
  OfObservable { value, _err: PhantomData }
}

pub struct FromIterObservable<I, Err> {
  iter: I,
  _err: PhantomData<fn() -> Err>,
}

impl<I: Clone, Err> Clone for FromIterObservable<I, Err> {
  fn clone(&self) -> Self {
    FromIterObservable { iter: self.iter.clone(), _err: PhantomData }
  }
}

impl<I, Err> Observable for FromIterObservable<I, Err>
where
  I: IntoIterator,
{
  type Item = I::Item;
  type Err = Err;
  type Unsub = NopSubscription;

  fn actual_subscribe<O>(self, mut observer: O) -> Self::Unsub
  where
    O: Observer<I::Item, Err> + Send + 'static,
  {
    for value in self.iter {
      if observer.is_closed() {
        return NopSubscription;
      }
      observer.next(value);
    }
    observer.complete();
    NopSubscription
  }
}

pub struct OfObservable<Item, Err> {
  value: Item,
  _err: PhantomData<fn() -> Err>,
}

impl<Item: Clone, Err> Clone for OfObservable<Item, Err> {
  fn clone(&self) -> Self {
    OfObservable { value: self.value.clone(), _err: PhantomData }
  }
}

impl<Item, Err> Observable for OfObservable<Item, Err> {
  type Item = Item;
  type Err = Err;
  type Unsub = NopSubscription;

  fn actual_subscribe<O>(self, mut observer: O) -> Self::Unsub
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    observer.next(self.value);
    observer.complete();
    NopSubscription
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use std::sync::{Arc, Mutex};

  #[test]
  fn iterates_then_completes() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let done = Arc::new(Mutex::new(false));
    let s = seen.clone();
    let d = done.clone();
    from_iter::<_, ()>(0..4).subscribe_all(
      move |v| s.lock().unwrap().push(v),
      |_| {},
      move || *d.lock().unwrap() = true,
    );
    assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3]);
    assert!(*done.lock().unwrap());
  }

  #[test]
  fn of_emits_one_value() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    of::<_, ()>("solo").subscribe(move |v| s.lock().unwrap().push(v));
    assert_eq!(*seen.lock().unwrap(), vec!["solo"]);
  }
}
