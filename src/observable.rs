//! The Observable trait: push-based sources and the operations over them.
//!
//! An observable's only essential operation is subscribing an observer,
//! which returns a cancellation handle; every call creates an independent
//! subscription with its own state. The provided methods construct the
//! concurrency combinators from [`crate::ops`]; thin value-transform
//! operators are deliberately not part of this crate, they can be layered
//! on top of the same three contracts (observer, subscription, scheduler).

use crate::{
  observer::{CheckedObserver, FnObserver, Observer, ObserverFns},
  ops::{
    catch::CatchOp,
    delay::DelayOp,
    join::{JoinSource, Pattern2},
    merge::MergeOp,
    merge_all::MergeAllOp,
    observe_on::ObserveOnOp,
    retry::RetryOp,
    sample::SampleOp,
    switch_on_next::SwitchOnNextOp,
    zip::ZipOp,
  },
  scheduler::Duration,
  subscription::SubscriptionLike,
};

mod boxed;
mod create;
mod defer;
mod from_iter;
mod interval;
mod timer;
mod trivial;

pub use boxed::{BoxedCloneObservable, BoxedObservable};
pub use create::{create, CreateObservable};
pub use defer::{defer, DeferObservable};
pub use from_iter::{from_iter, of, FromIterObservable, OfObservable};
pub use interval::{interval, IntervalObservable};
pub use timer::{timer, timer_at, TimerObservable};
pub use trivial::{empty, never, throw, EmptyObservable, NeverObservable, ThrowObservable};

/// A push-based source of a value stream.
pub trait Observable: Sized {
  type Item;
  type Err;
  type Unsub: SubscriptionLike + Send + 'static;

  /// Subscribe `observer` to this source. This is the raw entry point used
  /// by combinators; consumer code normally goes through [`subscribe`]
  /// (/`subscribe_all`), which installs the grammar-enforcing wrapper.
  ///
  /// [`subscribe`]: Observable::subscribe
  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<Self::Item, Self::Err> + Send + 'static;

  // ==================== consumer entry points ====================

  /// Subscribe with a `next` closure; errors and completion are discarded.
  fn subscribe<N>(self, next: N) -> Self::Unsub
  where
    N: FnMut(Self::Item) + Send + 'static,
  {
    self.actual_subscribe(CheckedObserver::new(FnObserver::new(next)))
  }

  /// Subscribe with `next`, `error` and `complete` closures.
  fn subscribe_all<N, E, C>(self, next: N, error: E, complete: C) -> Self::Unsub
  where
    N: FnMut(Self::Item) + Send + 'static,
    E: FnOnce(Self::Err) + Send + 'static,
    C: FnOnce() + Send + 'static,
  {
    self.actual_subscribe(CheckedObserver::new(ObserverFns::new(
      next, error, complete,
    )))
  }

  /// Subscribe a custom observer, shielded by [`CheckedObserver`].
  fn subscribe_observer<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<Self::Item, Self::Err> + Send + 'static,
  {
    self.actual_subscribe(CheckedObserver::new(observer))
  }

  // ==================== concurrency combinators ====================

  /// Merge the emissions of `self` and `other` into one stream; completes
  /// after both complete, errors as soon as either errors.
  fn merge<S>(self, other: S) -> MergeOp<Self, S> {
    MergeOp { source1: self, source2: other }
  }

  /// Flatten a source of observables, subscribing every inner observable
  /// concurrently as it arrives.
  fn merge_all(self) -> MergeAllOp<Self> { MergeAllOp { source: self } }

  /// Flatten a source of observables keeping only the latest inner: a new
  /// inner observable unsubscribes the previous one, and notifications from
  /// replaced inners are silently dropped.
  fn switch_on_next(self) -> SwitchOnNextOp<Self> {
    SwitchOnNextOp { source: self }
  }

  /// Pair values of `self` and `other` in order, buffering the faster side.
  fn zip<S>(self, other: S) -> ZipOp<Self, S> {
    ZipOp { source_a: self, source_b: other }
  }

  /// Re-deliver all notifications on `scheduler`, preserving order.
  fn observe_on<SD>(self, scheduler: SD) -> ObserveOnOp<Self, SD> {
    ObserveOnOp { source: self, scheduler }
  }

  /// Shift every notification by `delay`, measured against each one's
  /// arrival time, delivering on `scheduler`.
  fn delay<SD>(self, delay: Duration, scheduler: SD) -> DelayOp<Self, SD> {
    DelayOp { source: self, delay, scheduler }
  }

  /// Emit the latest value of `self` at each tick of `notifier`; stale
  /// ticks (no fresh value since the previous tick) emit nothing.
  fn sample<N>(self, notifier: N) -> SampleOp<Self, N> {
    SampleOp { source: self, notifier }
  }

  /// On error, continue with the observable produced by `handler`. Errors
  /// of the fallback propagate unhandled.
  fn catch<F, Fallback>(self, handler: F) -> CatchOp<Self, F, Fallback>
  where
    F: FnOnce(Self::Err) -> Fallback,
    Fallback: Observable<Item = Self::Item>,
  {
    CatchOp {
      source: self,
      handler,
      _fallback: std::marker::PhantomData,
    }
  }

  /// Resubscribe to the source on error: `Some(n)` bounds the number of
  /// retry attempts, `None` retries forever.
  fn retry(self, count: Option<usize>) -> RetryOp<Self> {
    RetryOp { source: self, count }
  }

  /// Combine with `other` into a join pattern; see [`crate::ops::join`].
  fn and<S2>(self, other: S2) -> Pattern2<Self::Item, S2::Item, Self::Err>
  where
    Self: Clone + Send + 'static,
    S2: Observable<Err = Self::Err> + Clone + Send + 'static,
    Self::Item: Send + 'static,
    S2::Item: Send + 'static,
    Self::Err: Send + 'static,
  {
    Pattern2::new(JoinSource::new(self), JoinSource::new(other))
  }

  // ==================== type erasure ====================

  fn box_it(self) -> BoxedObservable<Self::Item, Self::Err>
  where
    Self: Send + 'static,
    Self::Item: 'static,
    Self::Err: 'static,
  {
    BoxedObservable::new(self)
  }

  fn box_clone(self) -> BoxedCloneObservable<Self::Item, Self::Err>
  where
    Self: Clone + Send + 'static,
    Self::Item: 'static,
    Self::Err: 'static,
  {
    BoxedCloneObservable::new(self)
  }
}
