//! Subscription handles and their composition containers.
//!
//! A subscription is the cancellation handle returned by
//! `Observable::actual_subscribe`. Unsubscribing is idempotent and safe to
//! race from several threads; the underlying cleanup runs exactly once.
//! The containers in the submodules (`single`, `serial`, `composite`,
//! `action`) are the ownership primitives combinators build their teardown
//! graphs from.

use std::{
  fmt::{Debug, Formatter},
  sync::{Arc, Mutex},
};

mod action;
mod composite;
mod serial;
mod single;

pub use action::{ActionSubscription, NopSubscription};
pub use composite::{CompositeSubscription, StableCompositeSubscription};
pub use serial::SerialSubscription;
pub use single::SingleAssignmentSubscription;

/// Handle returned from `Observable::actual_subscribe` to allow
/// unsubscribing before the stream terminates on its own.
pub trait SubscriptionLike {
  /// Cancel the subscription. Calling this more than once is a no-op; the
  /// first call wins and the cleanup action runs exactly once.
  fn unsubscribe(&mut self);

  fn is_closed(&self) -> bool;

  /// Erase the concrete handle type.
  fn boxed(self) -> BoxSubscription
  where
    Self: Sized + Send + 'static,
  {
    Box::new(self)
  }
}

/// Type-erased subscription handle.
pub type BoxSubscription = Box<dyn SubscriptionLike + Send>;

impl Debug for BoxSubscription {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("BoxSubscription")
      .field("is_closed", &self.is_closed())
      .finish()
  }
}

impl<T: SubscriptionLike + ?Sized> SubscriptionLike for Box<T> {
  #[inline]
  fn unsubscribe(&mut self) { (**self).unsubscribe() }

  #[inline]
  fn is_closed(&self) -> bool { (**self).is_closed() }
}

impl<T: SubscriptionLike> SubscriptionLike for Arc<Mutex<T>> {
  #[inline]
  fn unsubscribe(&mut self) { self.lock().unwrap().unsubscribe() }

  #[inline]
  fn is_closed(&self) -> bool { self.lock().unwrap().is_closed() }
}

/// An RAII wrapper that unsubscribes when dropped.
///
/// If you want to drop it immediately, wrap it in its own scope.
#[derive(Debug)]
#[must_use]
pub struct SubscriptionGuard<T: SubscriptionLike>(pub(crate) T);

impl<T: SubscriptionLike> SubscriptionGuard<T> {
  pub fn new(subscription: T) -> Self { SubscriptionGuard(subscription) }
}

impl<T: SubscriptionLike> Drop for SubscriptionGuard<T> {
  #[inline]
  fn drop(&mut self) { self.0.unsubscribe() }
}
