use std::marker::PhantomData;

use crate::{observable::Observable, observer::Observer};

/// Call `factory` once per subscription and subscribe to the observable it
/// returns, so each subscriber gets a fresh source.
pub fn defer<F, S>(factory: F) -> DeferObservable<F, S>
where
  F: Fn() -> S,
  S: Observable,
{
  DeferObservable { factory, _source: PhantomData }
}

pub struct DeferObservable<F, S> {
  factory: F,
  _source: PhantomData<fn() -> S>,
}

impl<F: Clone, S> Clone for DeferObservable<F, S> {
  fn clone(&self) -> Self {
    DeferObservable { factory: self.factory.clone(), _source: PhantomData }
  }
}

impl<F, S> Observable for DeferObservable<F, S>
where
  F: Fn() -> S,
  S: Observable,
{
  type Item = S::Item;
  type Err = S::Err;
  type Unsub = S::Unsub;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<S::Item, S::Err> + Send + 'static,
  {
    (self.factory)().actual_subscribe(observer)
  }
}
