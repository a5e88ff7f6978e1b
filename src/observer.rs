//! Observer trait and the adapter types built over it.
//!
//! An observer receives `next` values followed by at most one terminal
//! notification (`error` or `complete`), and nothing after that. Terminal
//! methods take `&mut self` rather than `self` so an observer can sit behind
//! a shared handle while several producers feed it; the stream grammar is
//! enforced at the edges by [`CheckedObserver`] and by combinator
//! discipline, not by the type system.

use std::sync::{Arc, Mutex};

/// The consumer side of a push stream.
pub trait Observer<Item, Err> {
  /// Receive the next value.
  fn next(&mut self, value: Item);

  /// Receive the terminal error. No notification of any kind may follow.
  fn error(&mut self, err: Err);

  /// Receive the terminal completion. No notification of any kind may
  /// follow.
  fn complete(&mut self);

  /// `true` once the observer will not accept more notifications; sources
  /// use this to stop emitting early.
  fn is_closed(&self) -> bool;
}

impl<Item, Err, O: Observer<Item, Err> + ?Sized> Observer<Item, Err> for Box<O> {
  #[inline]
  fn next(&mut self, value: Item) { (**self).next(value) }

  #[inline]
  fn error(&mut self, err: Err) { (**self).error(err) }

  #[inline]
  fn complete(&mut self) { (**self).complete() }

  #[inline]
  fn is_closed(&self) -> bool { (**self).is_closed() }
}

/// Type-erased observer.
pub type BoxObserver<Item, Err> = Box<dyn Observer<Item, Err> + Send>;

/// A materialized notification, as buffered by the join engine and the
/// producer-consumer queue drains.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification<Item, Err> {
  Next(Item),
  Error(Err),
  Complete,
}

// ============================================================================
// Closure adapters
// ============================================================================

/// Observer over a bare `next` closure; errors and completion are ignored.
///
/// This is what `Observable::subscribe(f)` wraps. Attach an error handler
/// with `subscribe_all` when the stream can fail.
pub struct FnObserver<N>(N);

impl<N> FnObserver<N> {
  pub fn new(next: N) -> Self { FnObserver(next) }
}

impl<Item, Err, N> Observer<Item, Err> for FnObserver<N>
where
  N: FnMut(Item),
{
  #[inline]
  fn next(&mut self, value: Item) { (self.0)(value) }

  fn error(&mut self, _err: Err) {}

  fn complete(&mut self) {}

  fn is_closed(&self) -> bool { false }
}

/// Observer built from three callbacks.
///
/// This is the "unchecked create": it does not re-validate the stream
/// grammar, the caller (normally a combinator, or `subscribe_all` which
/// wraps it in [`CheckedObserver`]) is responsible for honoring it.
pub struct ObserverFns<N, E, C> {
  next: N,
  error: Option<E>,
  complete: Option<C>,
}

impl<N, E, C> ObserverFns<N, E, C> {
  pub fn new(next: N, error: E, complete: C) -> Self {
    ObserverFns {
      next,
      error: Some(error),
      complete: Some(complete),
    }
  }
}

impl<Item, Err, N, E, C> Observer<Item, Err> for ObserverFns<N, E, C>
where
  N: FnMut(Item),
  E: FnOnce(Err),
  C: FnOnce(),
{
  fn next(&mut self, value: Item) { (self.next)(value) }

  fn error(&mut self, err: Err) {
    self.complete.take();
    if let Some(on_error) = self.error.take() {
      on_error(err);
    }
  }

  fn complete(&mut self) {
    self.error.take();
    if let Some(on_complete) = self.complete.take() {
      on_complete();
    }
  }

  fn is_closed(&self) -> bool {
    self.error.is_none() && self.complete.is_none()
  }
}

// ============================================================================
// Grammar enforcement
// ============================================================================

/// Wrapper that physically blocks notifications after a terminal one.
///
/// `subscribe`/`subscribe_all` install this at the consumer boundary so that
/// whatever a (possibly buggy) upstream does, the observer the caller
/// attached sees a well-formed stream: `next* (error | complete)?`.
pub struct CheckedObserver<O> {
  observer: O,
  stopped: bool,
}

impl<O> CheckedObserver<O> {
  pub fn new(observer: O) -> Self {
    CheckedObserver { observer, stopped: false }
  }
}

impl<Item, Err, O> Observer<Item, Err> for CheckedObserver<O>
where
  O: Observer<Item, Err>,
{
  fn next(&mut self, value: Item) {
    if !self.stopped {
      self.observer.next(value);
    }
  }

  fn error(&mut self, err: Err) {
    if !self.stopped {
      self.stopped = true;
      self.observer.error(err);
    }
  }

  fn complete(&mut self) {
    if !self.stopped {
      self.stopped = true;
      self.observer.complete();
    }
  }

  fn is_closed(&self) -> bool { self.stopped || self.observer.is_closed() }
}

// ============================================================================
// Shared observer
// ============================================================================

/// A clonable handle to one downstream observer.
///
/// Multi-producer combinators hand a clone of this to each upstream adapter;
/// a terminal notification takes the inner observer out, so later calls
/// through any clone are silently dropped ("disposal wins" also applies to
/// the terminal race).
pub struct SharedObserver<O>(Arc<Mutex<Option<O>>>);

impl<O> SharedObserver<O> {
  pub fn new(observer: O) -> Self {
    SharedObserver(Arc::new(Mutex::new(Some(observer))))
  }

  /// Drop the inner observer without delivering a terminal notification;
  /// later calls through any clone become no-ops. This is the unsubscribe
  /// path, as opposed to the terminal path of `error`/`complete`.
  pub fn detach(&self) { self.0.lock().unwrap().take(); }
}

impl<O> Clone for SharedObserver<O> {
  fn clone(&self) -> Self { SharedObserver(self.0.clone()) }
}

impl<Item, Err, O> Observer<Item, Err> for SharedObserver<O>
where
  O: Observer<Item, Err>,
{
  fn next(&mut self, value: Item) {
    let mut inner = self.0.lock().unwrap();
    if let Some(observer) = inner.as_mut() {
      observer.next(value);
    }
  }

  fn error(&mut self, err: Err) {
    let taken = self.0.lock().unwrap().take();
    if let Some(mut observer) = taken {
      observer.error(err);
    }
  }

  fn complete(&mut self) {
    let taken = self.0.lock().unwrap().take();
    if let Some(mut observer) = taken {
      observer.complete();
    }
  }

  fn is_closed(&self) -> bool {
    let inner = self.0.lock().unwrap();
    match inner.as_ref() {
      Some(observer) => observer.is_closed(),
      None => true,
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;

  struct Recording {
    values: Vec<i32>,
    errors: Vec<&'static str>,
    completions: usize,
  }

  impl Recording {
    fn new() -> Self {
      Recording { values: vec![], errors: vec![], completions: 0 }
    }
  }

  impl Observer<i32, &'static str> for Recording {
    fn next(&mut self, value: i32) { self.values.push(value); }

    fn error(&mut self, err: &'static str) { self.errors.push(err); }

    fn complete(&mut self) { self.completions += 1; }

    fn is_closed(&self) -> bool { false }
  }

  #[test]
  fn checked_observer_blocks_post_terminal_calls() {
    let mut checked = CheckedObserver::new(Recording::new());
    checked.next(1);
    checked.complete();
    checked.next(2);
    checked.error("late");
    checked.complete();

    assert_eq!(checked.observer.values, vec![1]);
    assert!(checked.observer.errors.is_empty());
    assert_eq!(checked.observer.completions, 1);
    assert!(checked.is_closed());
  }

  #[test]
  fn shared_observer_takes_inner_on_terminal() {
    let mut a = SharedObserver::new(Recording::new());
    let mut b = a.clone();
    a.next(1);
    b.next(2);
    b.error("boom");
    a.next(3);
    a.complete();
    assert!(a.is_closed());
  }

  #[test]
  fn observer_fns_dispatch() {
    let mut seen = Vec::new();
    let mut completed = false;
    {
      let mut observer = ObserverFns::new(
        |v: i32| seen.push(v),
        |_e: &'static str| {},
        || completed = true,
      );
      observer.next(7);
      observer.complete();
      assert!(observer.is_closed());
    }
    assert_eq!(seen, vec![7]);
    assert!(completed);
  }
}
