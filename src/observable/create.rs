use std::marker::PhantomData;

use crate::{
  observable::Observable,
  observer::{Observer, SharedObserver},
  subscription::ActionSubscription,
};

/// Build an observable from an emitter closure.
///
/// The closure runs synchronously at subscribe time and pushes notifications
/// through the observer it is handed. Returning `Err` delivers the error to
/// the observer, so a fallible emitter can use `?` all the way down:
///
/// ```
/// use rxcore::prelude::*;
///
/// let numbers = observable::create(|observer: &mut dyn Observer<i32, ()>| {
///   observer.next(1);
///   observer.next(2);
///   observer.complete();
///   Ok(())
/// });
/// numbers.subscribe(|v| println!("{}", v));
/// ```
///
/// Long-running emitters should poll `observer.is_closed()` and stop once
/// the subscription was cancelled.
pub fn create<F, Item, Err>(subscribe_fn: F) -> CreateObservable<F, Item, Err>
where
  F: FnOnce(&mut dyn Observer<Item, Err>) -> Result<(), Err>,
{
  CreateObservable { subscribe_fn, _hint: PhantomData }
}

pub struct CreateObservable<F, Item, Err> {
  subscribe_fn: F,
  _hint: PhantomData<fn() -> (Item, Err)>,
}

impl<F: Clone, Item, Err> Clone for CreateObservable<F, Item, Err> {
  fn clone(&self) -> Self {
    CreateObservable {
      subscribe_fn: self.subscribe_fn.clone(),
      _hint: PhantomData,
    }
  }
}

impl<F, Item, Err> Observable for CreateObservable<F, Item, Err>
where
  F: FnOnce(&mut dyn Observer<Item, Err>) -> Result<(), Err>,
{
  type Item = Item;
  type Err = Err;
  type Unsub = ActionSubscription;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    let shared = SharedObserver::new(observer);
    let mut emitter = shared.clone();
    if let Err(err) = (self.subscribe_fn)(&mut emitter) {
      emitter.error(err);
    }
    ActionSubscription::new(move || shared.detach())
  }
}
