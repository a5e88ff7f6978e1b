use std::marker::PhantomData;

use crate::{
  observable::Observable,
  observer::Observer,
  subscription::{ActionSubscription, NopSubscription},
};

/// Complete immediately without emitting.
pub fn empty<Item, Err>() -> EmptyObservable<Item, Err> {
  EmptyObservable(PhantomData)
}

/// Never emit and never terminate. The returned subscription stays open
/// until it is unsubscribed.
pub fn never<Item, Err>() -> NeverObservable<Item, Err> {
  NeverObservable(PhantomData)
}

/// Error immediately with `err`.
pub fn throw<Item, Err>(err: Err) -> ThrowObservable<Item, Err> {
  ThrowObservable { err, _item: PhantomData }
}

pub struct EmptyObservable<Item, Err>(PhantomData<fn() -> (Item, Err)>);

impl<Item, Err> Clone for EmptyObservable<Item, Err> {
  fn clone(&self) -> Self { *self }
}
impl<Item, Err> Copy for EmptyObservable<Item, Err> {}

impl<Item, Err> Observable for EmptyObservable<Item, Err> {
  type Item = Item;
  type Err = Err;
  type Unsub = NopSubscription;

  fn actual_subscribe<O>(self, mut observer: O) -> Self::Unsub
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    observer.complete();
    NopSubscription
  }
}

pub struct NeverObservable<Item, Err>(PhantomData<fn() -> (Item, Err)>);

impl<Item, Err> Clone for NeverObservable<Item, Err> {
  fn clone(&self) -> Self { *self }
}
impl<Item, Err> Copy for NeverObservable<Item, Err> {}

impl<Item, Err> Observable for NeverObservable<Item, Err> {
  type Item = Item;
  type Err = Err;
  type Unsub = ActionSubscription;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    // Hold the observer alive until unsubscribe so is_closed stays false.
    ActionSubscription::new(move || drop(observer))
  }
}

pub struct ThrowObservable<Item, Err> {
  err: Err,
  _item: PhantomData<fn() -> Item>,
}

impl<Item, Err: Clone> Clone for ThrowObservable<Item, Err> {
  fn clone(&self) -> Self {
    ThrowObservable { err: self.err.clone(), _item: PhantomData }
  }
}

impl<Item, Err> Observable for ThrowObservable<Item, Err> {
  type Item = Item;
  type Err = Err;
  type Unsub = NopSubscription;

  fn actual_subscribe<O>(self, mut observer: O) -> Self::Unsub
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    observer.error(self.err);
    NopSubscription
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::subscription::SubscriptionLike;
  use std::sync::{Arc, Mutex};

  #[test]
  fn empty_only_completes() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let next_log = log.clone();
    let done_log = log.clone();
    empty::<i32, ()>().subscribe_all(
      move |_| next_log.lock().unwrap().push("next"),
      |_| {},
      move || done_log.lock().unwrap().push("complete"),
    );
    assert_eq!(*log.lock().unwrap(), vec!["complete"]);
  }

  #[test]
  fn never_stays_open_until_unsubscribed() {
    let mut subscription = never::<i32, ()>().subscribe(|_| {});
    assert!(!subscription.is_closed());
    subscription.unsubscribe();
    assert!(subscription.is_closed());
  }

  #[test]
  fn throw_delivers_the_error() {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let e = errors.clone();
    throw::<i32, _>("bang").subscribe_all(
      |_| {},
      move |err| e.lock().unwrap().push(err),
      || {},
    );
    assert_eq!(*errors.lock().unwrap(), vec!["bang"]);
  }
}
