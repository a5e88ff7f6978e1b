//! Pluggable executors for the time-based combinators.
//!
//! A scheduler accepts a unit of work together with "now", a relative delay
//! or an absolute due time, and returns a [`TaskHandle`] that cancels the
//! pending work. Cancellation is cooperative: the task receives a
//! [`CancelToken`] and must poll it at its own check points; a task whose
//! handle was unsubscribed before it started never runs its body.

use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc,
};

pub use std::time::{Duration, Instant};

use crate::subscription::SubscriptionLike;

mod immediate;
mod pool;

pub use immediate::ImmediateScheduler;
pub use pool::{default_pool, PoolScheduler};

/// Cooperative cancellation flag threaded through scheduled actions.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
  pub fn new() -> Self { Self::default() }

  #[inline]
  pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::Acquire) }

  pub(crate) fn cancel(&self) { self.0.store(true, Ordering::Release) }
}

/// Subscription handle for one scheduled task; unsubscribing sets the
/// task's cancel token.
#[derive(Clone)]
pub struct TaskHandle(CancelToken);

impl TaskHandle {
  pub fn new(token: CancelToken) -> Self { TaskHandle(token) }
}

impl SubscriptionLike for TaskHandle {
  fn unsubscribe(&mut self) { self.0.cancel() }

  fn is_closed(&self) -> bool { self.0.is_cancelled() }
}

/// A unit-of-work executor.
///
/// Implementations decide where and when the task runs; they must guarantee
/// that a task whose handle is closed before dispatch does not run, and that
/// `now` readings are monotonic. Periodic work is expressed by the task
/// re-scheduling its own delay each iteration (drift between iterations is
/// not compensated).
pub trait Scheduler: Clone + Send + 'static {
  /// Schedule `task`, after `delay` if one is given.
  fn schedule<F>(&self, delay: Option<Duration>, task: F) -> TaskHandle
  where
    F: FnOnce(CancelToken) + Send + 'static;

  /// Schedule `task` at an absolute due time; due times in the past run as
  /// soon as possible.
  fn schedule_at<F>(&self, due: Instant, task: F) -> TaskHandle
  where
    F: FnOnce(CancelToken) + Send + 'static,
  {
    let delay = due.saturating_duration_since(self.now());
    self.schedule(Some(delay), task)
  }

  /// The scheduler's monotonic clock.
  fn now(&self) -> Instant { Instant::now() }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn cancelled_handle_reports_closed() {
    let token = CancelToken::new();
    let mut handle = TaskHandle::new(token.clone());
    assert!(!handle.is_closed());
    assert!(!token.is_cancelled());
    handle.unsubscribe();
    assert!(handle.is_closed());
    assert!(token.is_cancelled());
  }
}
