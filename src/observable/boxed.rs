//! Type-erased observables.
//!
//! Erasure pins `Unsub` to [`BoxSubscription`]; it is how heterogeneous
//! sources end up in one collection, and how the join engine stores the
//! sources a pattern was built from.

use crate::{
  observable::Observable,
  observer::{BoxObserver, Observer},
  subscription::{BoxSubscription, SubscriptionLike},
};

trait DynObservable<Item, Err> {
  fn dyn_subscribe(
    self: Box<Self>,
    observer: BoxObserver<Item, Err>,
  ) -> BoxSubscription;
}

impl<S> DynObservable<S::Item, S::Err> for S
where
  S: Observable,
  S::Item: 'static,
  S::Err: 'static,
{
  fn dyn_subscribe(
    self: Box<Self>,
    observer: BoxObserver<S::Item, S::Err>,
  ) -> BoxSubscription {
    (*self).actual_subscribe(observer).boxed()
  }
}

pub struct BoxedObservable<Item, Err>(Box<dyn DynObservable<Item, Err> + Send>);

impl<Item: 'static, Err: 'static> BoxedObservable<Item, Err> {
  pub fn new<S>(source: S) -> Self
  where
    S: Observable<Item = Item, Err = Err> + Send + 'static,
  {
    BoxedObservable(Box::new(source))
  }
}

impl<Item: 'static, Err: 'static> Observable for BoxedObservable<Item, Err> {
  type Item = Item;
  type Err = Err;
  type Unsub = BoxSubscription;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    self.0.dyn_subscribe(Box::new(observer))
  }
}

trait DynCloneObservable<Item, Err>: DynObservable<Item, Err> {
  fn dyn_clone(&self) -> Box<dyn DynCloneObservable<Item, Err> + Send>;
}

impl<S> DynCloneObservable<S::Item, S::Err> for S
where
  S: Observable + Clone + Send + 'static,
  S::Item: 'static,
  S::Err: 'static,
{
  fn dyn_clone(&self) -> Box<dyn DynCloneObservable<S::Item, S::Err> + Send> {
    Box::new(self.clone())
  }
}

/// A boxed observable that can still be cloned, for re-subscription.
pub struct BoxedCloneObservable<Item, Err>(
  Box<dyn DynCloneObservable<Item, Err> + Send>,
);

impl<Item: 'static, Err: 'static> BoxedCloneObservable<Item, Err> {
  pub fn new<S>(source: S) -> Self
  where
    S: Observable<Item = Item, Err = Err> + Clone + Send + 'static,
  {
    BoxedCloneObservable(Box::new(source))
  }
}

impl<Item, Err> Clone for BoxedCloneObservable<Item, Err> {
  fn clone(&self) -> Self { BoxedCloneObservable(self.0.dyn_clone()) }
}

impl<Item: 'static, Err: 'static> Observable
  for BoxedCloneObservable<Item, Err>
{
  type Item = Item;
  type Err = Err;
  type Unsub = BoxSubscription;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    self.0.dyn_subscribe(Box::new(observer))
  }
}
